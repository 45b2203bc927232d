use std::collections::HashSet;

use chrono::SecondsFormat;
use serde_json::{Map, Number, Value as Json};

use super::tagged;
use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::plan::FieldPlan;
use crate::registry::Scope;
use crate::shape::Shape;
use crate::value::Value;

/// Builds a JSON tree from one value.
pub struct JsonEncoder<'c> {
    codec: &'c Codec,
    depth: usize,
}

impl<'c> JsonEncoder<'c> {
    pub fn new(codec: &'c Codec) -> Self {
        Self { codec, depth: 0 }
    }

    /// Encode a top-level value. Pointer levels are transparent; registered
    /// concrete types are wrapped in the tagged form.
    pub fn encode_top_level(mut self, value: &Value, shape: &Shape) -> CodecResult<Json> {
        let (depth, leaf) = shape.peel();
        if depth > 0 {
            if let Shape::Interface(contract) = leaf {
                return Err(CodecError::Unsupported(format!(
                    "pointer to interface {contract}"
                )));
            }
            if value.is_null() {
                return Ok(nil_json(leaf));
            }
        }
        let body = self.encode(value, leaf)?;
        match self.codec.top_level_concrete(leaf) {
            Some(info) => Ok(tagged(&info.tag, body)),
            None => Ok(body),
        }
    }

    fn encode(&mut self, value: &Value, shape: &Shape) -> CodecResult<Json> {
        let json = match shape {
            Shape::Bool => match value {
                Value::Bool(b) => Json::Bool(*b),
                other => return Err(CodecError::mismatch("bool", other.kind())),
            },
            Shape::Int => Json::from(value.as_i64()?),
            Shape::Uint => Json::from(value.as_u64()?),
            Shape::Float => {
                if !self.codec.config().allow_floats {
                    return Err(CodecError::Unsupported(
                        "floating point values are disabled".into(),
                    ));
                }
                match value {
                    Value::Float(f) => Number::from_f64(*f).map(Json::Number).ok_or_else(|| {
                        CodecError::Unsupported(format!("{f} has no JSON representation"))
                    })?,
                    other => return Err(CodecError::mismatch("float", other.kind())),
                }
            }
            Shape::Str => match value {
                Value::Str(s) => Json::String(s.clone()),
                other => return Err(CodecError::mismatch("string", other.kind())),
            },
            Shape::Bytes => match value {
                Value::Bytes(b) => Json::String(hex::encode(b)),
                other => return Err(CodecError::mismatch("bytes", other.kind())),
            },
            Shape::Time => match value {
                Value::Time(t) => Json::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
                other => return Err(CodecError::mismatch("time", other.kind())),
            },
            Shape::Ptr(_) => {
                let (_, leaf) = shape.peel();
                if let Shape::Interface(contract) = leaf {
                    return Err(CodecError::Unsupported(format!(
                        "pointer to interface {contract}"
                    )));
                }
                self.encode_present(value, leaf)?
            }
            Shape::List(elem) => {
                let Value::List(items) = value else {
                    return Err(CodecError::mismatch("list", value.kind()));
                };
                self.enter()?;
                let encoded = items
                    .iter()
                    .map(|item| self.encode(item, elem))
                    .collect::<CodecResult<Vec<_>>>()?;
                self.leave();
                Json::Array(encoded)
            }
            Shape::Map(elem) | Shape::UnorderedMap(elem) => {
                let mut obj = Map::new();
                match value {
                    Value::Null => {}
                    Value::Map(entries) => {
                        self.enter()?;
                        for (key, item) in entries {
                            obj.insert(key.clone(), self.encode(item, elem)?);
                        }
                        self.leave();
                    }
                    other => return Err(CodecError::mismatch("map", other.kind())),
                }
                Json::Object(obj)
            }
            Shape::Func => {
                return Err(CodecError::Unsupported(
                    "callable values have no JSON encoding".into(),
                ))
            }
            Shape::Struct(s) => {
                let plan = self.codec.plans().plan_for(s)?;
                let Value::Struct(slots) = value else {
                    return Err(CodecError::mismatch("struct", value.kind()));
                };
                self.enter()?;
                let mut obj = Map::new();
                self.encode_fields(&mut obj, &plan, slots, &HashSet::new())?;
                self.leave();
                Json::Object(obj)
            }
            Shape::Named(_, inner) => self.encode(value, inner)?,
            Shape::Custom(ty, _) => match value {
                Value::Json(json) => json.clone(),
                other => {
                    return Err(CodecError::Mismatch {
                        expected: "custom JSON",
                        found: format!("{} for {ty}", other.kind()),
                    })
                }
            },
            Shape::Interface(contract) => match value {
                Value::Null => Json::Null,
                Value::Dyn(held) => {
                    self.enter()?;
                    let (info, _) = self.codec.registry().resolve_member(
                        Scope::for_contract(*contract),
                        held.type_id,
                        held.type_name,
                    )?;
                    let payload = self.encode(&held.value, &(info.shape)())?;
                    self.leave();
                    tagged(&info.tag, payload)
                }
                other => return Err(CodecError::mismatch("interface", other.kind())),
            },
        };
        Ok(json)
    }

    /// Write the plan's fields into `obj`. Promoted fields recurse with the
    /// names they lose added to `shadow`.
    fn encode_fields(
        &mut self,
        obj: &mut Map<String, Json>,
        plan: &FieldPlan,
        slots: &[Value],
        shadow: &HashSet<&'static str>,
    ) -> CodecResult<()> {
        for field in &plan.fields {
            let slot = slots.get(field.slot).ok_or_else(|| {
                CodecError::Malformed(format!(
                    "{} has no slot for field {}",
                    plan.ty.name, field.name
                ))
            })?;

            if let Some(sub) = &field.promoted {
                let inner = match slot {
                    Value::Struct(inner) => inner,
                    Value::Null => continue,
                    other => return Err(CodecError::mismatch("struct", other.kind())),
                };
                let inner_shadow: HashSet<&'static str> =
                    shadow.union(&field.hidden).copied().collect();
                self.encode_fields(obj, sub, inner, &inner_shadow)?;
                continue;
            }

            if shadow.contains(field.wire_name) {
                continue;
            }
            // A set pointer is never empty, even if it points at a zero.
            let omit = if field.depth > 0 {
                slot.is_null()
            } else {
                slot.is_empty()
            };
            if field.omit_empty && omit {
                continue;
            }

            let json = if field.depth > 0 {
                self.encode_present(slot, &field.leaf)?
            } else {
                self.encode(slot, &field.leaf)?
            };
            obj.insert(field.wire_name.to_owned(), json);
        }
        Ok(())
    }

    fn encode_present(&mut self, value: &Value, leaf: &Shape) -> CodecResult<Json> {
        if value.is_null() {
            Ok(nil_json(leaf))
        } else {
            self.encode(value, leaf)
        }
    }

    fn enter(&mut self) -> CodecResult<()> {
        self.depth += 1;
        let max = self.codec.config().max_depth;
        if self.depth > max {
            return Err(CodecError::DepthExceeded(max));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }
}

/// Nil maps render as `{}`, every other nil as `null`.
fn nil_json(leaf: &Shape) -> Json {
    if leaf.is_map() {
        Json::Object(Map::new())
    } else {
        Json::Null
    }
}
