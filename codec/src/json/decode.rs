use std::collections::{BTreeMap, HashSet};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as Json};

use super::{json_kind, TYPE_KEY, VALUE_KEY};
use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::plan::FieldPlan;
use crate::registry::{Scope, Tag};
use crate::shape::Shape;
use crate::value::{DynValue, Value};

/// Rebuilds a value from a JSON tree.
pub struct JsonDecoder<'c> {
    codec: &'c Codec,
    depth: usize,
}

impl<'c> JsonDecoder<'c> {
    pub fn new(codec: &'c Codec) -> Self {
        Self { codec, depth: 0 }
    }

    /// Decode a top-level value. `null` into a pointer type is nil; a
    /// registered concrete type must arrive in the tagged form.
    pub fn decode_top_level(mut self, json: Json, shape: &Shape) -> CodecResult<Value> {
        let (depth, leaf) = shape.peel();
        if depth > 0 {
            if let Shape::Interface(contract) = leaf {
                return Err(CodecError::Unsupported(format!(
                    "pointer to interface {contract}"
                )));
            }
            if json.is_null() {
                return Ok(Value::Null);
            }
        }
        let json = match self.codec.top_level_concrete(leaf) {
            Some(expected) => {
                let (tag, payload) = self.split_tagged(json)?;
                let found = self
                    .codec
                    .registry()
                    .resolve_tag(Scope::Global, tag.as_bytes())?;
                if found.ty != expected.ty {
                    return Err(CodecError::TagMismatch {
                        expected: expected.ty.name,
                        found: tag.to_hex(),
                    });
                }
                payload
            }
            None => json,
        };
        self.decode(json, leaf)
    }

    fn decode(&mut self, json: Json, shape: &Shape) -> CodecResult<Value> {
        if json.is_null() {
            return Ok(match shape {
                Shape::Custom(..) => Value::Json(Json::Null),
                _ => Value::Null,
            });
        }

        let value = match shape {
            Shape::Bool => match json {
                Json::Bool(b) => Value::Bool(b),
                other => return Err(CodecError::mismatch("bool", json_kind(&other))),
            },
            Shape::Int => match json.as_i64() {
                Some(i) => Value::Int(i),
                None => return Err(CodecError::mismatch("integer", json)),
            },
            Shape::Uint => match json.as_u64() {
                Some(u) => Value::Uint(u),
                None => return Err(CodecError::mismatch("unsigned integer", json)),
            },
            Shape::Float => {
                if !self.codec.config().allow_floats {
                    return Err(CodecError::Unsupported(
                        "floating point values are disabled".into(),
                    ));
                }
                match json.as_f64() {
                    Some(f) => Value::Float(f),
                    None => return Err(CodecError::mismatch("number", json)),
                }
            }
            Shape::Str => match json {
                Json::String(s) => Value::Str(s),
                other => return Err(CodecError::mismatch("string", json_kind(&other))),
            },
            Shape::Bytes => match json {
                Json::String(s) => {
                    let raw = hex::decode(&s)
                        .map_err(|e| CodecError::Malformed(format!("invalid hex bytes: {e}")))?;
                    Value::Bytes(Bytes::from(raw))
                }
                other => return Err(CodecError::mismatch("hex string", json_kind(&other))),
            },
            Shape::Time => match json {
                Json::String(s) => {
                    let time = DateTime::parse_from_rfc3339(&s).map_err(|e| {
                        CodecError::Malformed(format!("invalid timestamp {s:?}: {e}"))
                    })?;
                    Value::Time(time.with_timezone(&Utc))
                }
                other => return Err(CodecError::mismatch("timestamp", json_kind(&other))),
            },
            Shape::Ptr(_) => {
                let (_, leaf) = shape.peel();
                if let Shape::Interface(contract) = leaf {
                    return Err(CodecError::Unsupported(format!(
                        "pointer to interface {contract}"
                    )));
                }
                self.decode(json, leaf)?
            }
            Shape::List(elem) => {
                let Json::Array(items) = json else {
                    return Err(CodecError::mismatch("array", json_kind(&json)));
                };
                self.enter()?;
                let decoded = items
                    .into_iter()
                    .map(|item| self.decode(item, elem))
                    .collect::<CodecResult<Vec<_>>>()?;
                self.leave();
                Value::List(decoded)
            }
            Shape::Map(elem) | Shape::UnorderedMap(elem) => {
                let Json::Object(obj) = json else {
                    return Err(CodecError::mismatch("object", json_kind(&json)));
                };
                self.enter()?;
                let mut entries = BTreeMap::new();
                for (key, item) in obj {
                    entries.insert(key, self.decode(item, elem)?);
                }
                self.leave();
                Value::Map(entries)
            }
            Shape::Func => {
                return Err(CodecError::Unsupported(
                    "callable values have no JSON encoding".into(),
                ))
            }
            Shape::Struct(s) => {
                let plan = self.codec.plans().plan_for(s)?;
                let Json::Object(mut obj) = json else {
                    return Err(CodecError::mismatch("object", json_kind(&json)));
                };
                self.enter()?;
                let mut slots = vec![Value::Null; plan.slots];
                self.decode_fields(&mut obj, &plan, &mut slots, &HashSet::new())?;
                self.leave();
                Value::Struct(slots)
            }
            Shape::Named(_, inner) => self.decode(json, inner)?,
            Shape::Custom(..) => Value::Json(json),
            Shape::Interface(contract) => {
                self.enter()?;
                let (tag, payload) = self.split_tagged(json)?;
                let info = self
                    .codec
                    .registry()
                    .resolve_tag(Scope::for_contract(*contract), tag.as_bytes())?;
                let inner = self.decode(payload, &(info.shape)())?;
                self.leave();
                Value::Dyn(Box::new(DynValue {
                    type_id: info.ty.id,
                    type_name: info.ty.name,
                    value: inner,
                }))
            }
        };
        Ok(value)
    }

    /// Fill `slots` from the keys of `obj`, consuming the keys it uses.
    fn decode_fields(
        &mut self,
        obj: &mut Map<String, Json>,
        plan: &FieldPlan,
        slots: &mut [Value],
        shadow: &HashSet<&'static str>,
    ) -> CodecResult<()> {
        for field in &plan.fields {
            if let Some(sub) = &field.promoted {
                let inner_shadow: HashSet<&'static str> =
                    shadow.union(&field.hidden).copied().collect();
                // A nil embedded pointer stays nil unless one of its keys shows up.
                if field.depth > 0
                    && !sub
                        .json_names()
                        .iter()
                        .any(|name| !inner_shadow.contains(name) && obj.contains_key(*name))
                {
                    continue;
                }
                let mut inner = vec![Value::Null; sub.slots];
                self.decode_fields(obj, sub, &mut inner, &inner_shadow)?;
                slots[field.slot] = Value::Struct(inner);
                continue;
            }

            if shadow.contains(field.wire_name) {
                continue;
            }
            let Some(json) = obj.remove(field.wire_name) else {
                continue;
            };
            slots[field.slot] = if field.depth > 0 && json.is_null() {
                Value::Null
            } else {
                self.decode(json, &field.leaf)?
            };
        }
        Ok(())
    }

    /// Take apart a `{"type": ..., "value": ...}` object. Any other key, or a
    /// missing one, is malformed input.
    fn split_tagged(&self, json: Json) -> CodecResult<(Tag, Json)> {
        let Json::Object(mut obj) = json else {
            return Err(CodecError::Malformed(format!(
                "expected a tagged object, found {}",
                json_kind(&json)
            )));
        };
        if obj.len() != 2 || !obj.contains_key(TYPE_KEY) || !obj.contains_key(VALUE_KEY) {
            let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
            return Err(CodecError::Malformed(format!(
                "tagged object must have exactly the keys \"type\" and \"value\", found {keys:?}"
            )));
        }
        let payload = obj.remove(VALUE_KEY).unwrap_or(Json::Null);
        let tag = match obj.remove(TYPE_KEY) {
            Some(Json::String(hex)) => Tag::parse_hex(&hex, self.codec.registry().layout())?,
            other => {
                return Err(CodecError::Malformed(format!(
                    "tag must be a hex string, found {}",
                    other.as_ref().map_or("nothing", json_kind)
                )))
            }
        };
        Ok((tag, payload))
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
