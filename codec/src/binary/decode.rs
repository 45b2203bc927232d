use bytes::{Buf, Bytes};
use chrono::{DateTime, Utc};

use super::check_binary_shape;
use super::varint::{read_uvarint, read_varint};
use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::plan::FieldDescriptor;
use crate::registry::{ConcreteInfo, Scope};
use crate::shape::Shape;
use crate::value::{DynValue, Value};

/// Reads one value from a byte slice.
///
/// Every read is bounds-checked; arbitrary input produces an error, never a
/// panic. Lengths and element counts are checked against the remaining
/// input before anything is allocated; element counts are also capped by
/// `max_list_len`, which is the only bound on zero-width elements.
pub struct BinaryDecoder<'c, 'b> {
    codec: &'c Codec,
    input: &'b [u8],
    depth: usize,
}

impl<'c, 'b> BinaryDecoder<'c, 'b> {
    pub fn new(codec: &'c Codec, input: &'b [u8]) -> Self {
        Self {
            codec,
            input,
            depth: 0,
        }
    }

    /// Fails if any input is left over.
    pub fn finish(&self) -> CodecResult<()> {
        if self.input.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes(self.input.len()))
        }
    }

    /// Decode a top-level value. Empty input into a pointer type is nil.
    pub fn decode_top_level(&mut self, shape: &Shape) -> CodecResult<Value> {
        check_binary_shape(shape)?;
        let (depth, leaf) = shape.peel();
        if depth > 0 && self.input.is_empty() {
            return Ok(Value::Null);
        }
        if let Some(expected) = self.codec.top_level_concrete(leaf) {
            let found = self
                .read_tag(Scope::Global)?
                .ok_or_else(|| CodecError::Malformed("missing type tag".into()))?;
            if found.ty != expected.ty {
                return Err(CodecError::TagMismatch {
                    expected: expected.ty.name,
                    found: found.tag.to_hex(),
                });
            }
        }
        self.decode(leaf)
    }

    fn decode(&mut self, shape: &Shape) -> CodecResult<Value> {
        let value = match shape {
            Shape::Bool => match self.read_u8()? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                other => {
                    return Err(CodecError::Malformed(format!("invalid bool byte {other:#04x}")))
                }
            },
            Shape::Int => Value::Int(self.read_varint()?),
            Shape::Uint => Value::Uint(self.read_uvarint()?),
            Shape::Float => {
                if !self.codec.config().allow_floats {
                    return Err(CodecError::Unsupported(
                        "floating point values are disabled".into(),
                    ));
                }
                let mut raw = self.read_slice(8)?;
                Value::Float(raw.get_f64_le())
            }
            Shape::Str => {
                let len = self.read_len()?;
                let raw = self.read_slice(len)?;
                let text = std::str::from_utf8(raw)
                    .map_err(|e| CodecError::Malformed(format!("invalid UTF-8: {e}")))?;
                Value::Str(text.to_owned())
            }
            Shape::Bytes => {
                let len = self.read_len()?;
                Value::Bytes(Bytes::copy_from_slice(self.read_slice(len)?))
            }
            Shape::Time => {
                let secs = self.read_varint()?;
                let nanos = u32::try_from(self.read_uvarint()?)
                    .map_err(|_| CodecError::Malformed("nanoseconds out of range".into()))?;
                let time = DateTime::<Utc>::from_timestamp(secs, nanos).ok_or_else(|| {
                    CodecError::Malformed(format!("timestamp {secs}.{nanos:09} out of range"))
                })?;
                Value::Time(time)
            }
            Shape::Ptr(_) => {
                check_binary_shape(shape)?;
                let (_, leaf) = shape.peel();
                self.decode_present(leaf)?
            }
            Shape::List(elem) => {
                check_binary_shape(elem)?;
                self.enter()?;
                let count = self.read_uvarint()?;
                let max = self.codec.config().max_list_len;
                if count > max as u64 {
                    return Err(CodecError::ListTooLong { len: count, max });
                }
                let remaining = self.input.len() as u64;
                if count > remaining && self.takes_bytes(elem)? {
                    return Err(CodecError::Truncated {
                        needed: usize::try_from(count - remaining).unwrap_or(usize::MAX),
                    });
                }
                let mut items = Vec::with_capacity(count.min(remaining) as usize);
                for _ in 0..count {
                    items.push(self.decode(elem)?);
                }
                self.leave();
                Value::List(items)
            }
            Shape::Map(_) | Shape::UnorderedMap(_) | Shape::Func => {
                return Err(CodecError::Unsupported(format!(
                    "{} has no binary encoding",
                    shape.describe()
                )));
            }
            Shape::Struct(s) => {
                let plan = self.codec.plans().plan_for(s)?;
                self.enter()?;
                let mut slots = vec![Value::Null; plan.slots];
                for field in &plan.fields {
                    slots[field.slot] = self.decode_field(field)?;
                }
                self.leave();
                Value::Struct(slots)
            }
            Shape::Named(_, inner) | Shape::Custom(_, inner) => self.decode(inner)?,
            Shape::Interface(contract) => {
                self.enter()?;
                let value = match self.read_tag(Scope::for_contract(*contract))? {
                    None => Value::Null,
                    Some(info) => {
                        let payload = self.decode(&(info.shape)())?;
                        Value::Dyn(Box::new(DynValue {
                            type_id: info.ty.id,
                            type_name: info.ty.name,
                            value: payload,
                        }))
                    }
                };
                self.leave();
                value
            }
        };
        Ok(value)
    }

    /// Whether every encoding of `shape` is at least one byte long. Only
    /// structs whose exported fields all encode to nothing are empty.
    fn takes_bytes(&self, shape: &Shape) -> CodecResult<bool> {
        match shape {
            Shape::Named(_, inner) | Shape::Custom(_, inner) => self.takes_bytes(inner),
            Shape::Struct(s) => {
                let plan = self.codec.plans().plan_for(s)?;
                for field in &plan.fields {
                    if field.depth > 0 || self.takes_bytes(&field.leaf)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    fn decode_field(&mut self, field: &FieldDescriptor) -> CodecResult<Value> {
        if field.depth == 0 {
            return self.decode(&field.leaf);
        }
        check_binary_shape(&field.leaf)?;
        self.decode_present(&field.leaf)
    }

    fn decode_present(&mut self, leaf: &Shape) -> CodecResult<Value> {
        match self.read_u8()? {
            0 => Ok(Value::Null),
            1 => self.decode(leaf),
            other => Err(CodecError::Malformed(format!(
                "invalid presence byte {other:#04x}"
            ))),
        }
    }

    /// Tag header: a length byte, then that many tag bytes. Zero means nil.
    fn read_tag(&mut self, scope: Scope) -> CodecResult<Option<ConcreteInfo>> {
        let len = usize::from(self.read_u8()?);
        if len == 0 {
            return Ok(None);
        }
        let raw = self.read_slice(len)?;
        self.codec.registry().resolve_tag(scope, raw).map(Some)
    }

    // -- Primitive reads ----------------------------------------------------

    fn read_u8(&mut self) -> CodecResult<u8> {
        if !self.input.has_remaining() {
            return Err(CodecError::Truncated { needed: 1 });
        }
        Ok(self.input.get_u8())
    }

    fn read_slice(&mut self, len: usize) -> CodecResult<&'b [u8]> {
        if self.input.len() < len {
            return Err(CodecError::Truncated {
                needed: len - self.input.len(),
            });
        }
        let (head, tail) = self.input.split_at(len);
        self.input = tail;
        Ok(head)
    }

    fn read_uvarint(&mut self) -> CodecResult<u64> {
        let (value, used) = read_uvarint(self.input)?;
        self.input.advance(used);
        Ok(value)
    }

    fn read_varint(&mut self) -> CodecResult<i64> {
        let (value, used) = read_varint(self.input)?;
        self.input.advance(used);
        Ok(value)
    }

    /// A length prefix that fits in the remaining input.
    fn read_len(&mut self) -> CodecResult<usize> {
        let len = self.read_uvarint()?;
        let remaining = self.input.len();
        match usize::try_from(len) {
            Ok(len) if len <= remaining => Ok(len),
            _ => Err(CodecError::Truncated {
                needed: usize::try_from(len)
                    .map(|len| len - remaining)
                    .unwrap_or(usize::MAX),
            }),
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
