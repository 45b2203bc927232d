use bytes::{BufMut, BytesMut};

use super::check_binary_shape;
use super::varint::{put_uvarint, put_varint};
use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::plan::FieldDescriptor;
use crate::registry::{Scope, Tag};
use crate::shape::Shape;
use crate::value::Value;

/// Writes one value into a byte buffer.
pub struct BinaryEncoder<'c> {
    codec: &'c Codec,
    buf: BytesMut,
    depth: usize,
}

impl<'c> BinaryEncoder<'c> {
    pub fn new(codec: &'c Codec) -> Self {
        Self {
            codec,
            buf: BytesMut::new(),
            depth: 0,
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf.to_vec()
    }

    /// Encode a top-level value. Pointer levels are transparent and a nil
    /// pointer produces no bytes at all.
    pub fn encode_top_level(&mut self, value: &Value, shape: &Shape) -> CodecResult<()> {
        check_binary_shape(shape)?;
        let (depth, leaf) = shape.peel();
        if depth > 0 && value.is_null() {
            return Ok(());
        }
        if let Some(info) = self.codec.top_level_concrete(leaf) {
            let (info, long_form) =
                self.codec
                    .registry()
                    .resolve_member(Scope::Global, info.ty.id, info.ty.name)?;
            self.put_tag(&info.tag, long_form);
        }
        self.encode(value, leaf)
    }

    fn encode(&mut self, value: &Value, shape: &Shape) -> CodecResult<()> {
        match shape {
            Shape::Bool => match value {
                Value::Bool(b) => self.buf.put_u8(u8::from(*b)),
                other => return Err(CodecError::mismatch("bool", other.kind())),
            },
            Shape::Int => put_varint(&mut self.buf, value.as_i64()?),
            Shape::Uint => put_uvarint(&mut self.buf, value.as_u64()?),
            Shape::Float => {
                if !self.codec.config().allow_floats {
                    return Err(CodecError::Unsupported(
                        "floating point values are disabled".into(),
                    ));
                }
                match value {
                    Value::Float(f) => self.buf.put_f64_le(*f),
                    other => return Err(CodecError::mismatch("float", other.kind())),
                }
            }
            Shape::Str => match value {
                Value::Str(s) => self.put_bytes(s.as_bytes()),
                other => return Err(CodecError::mismatch("string", other.kind())),
            },
            Shape::Bytes => match value {
                Value::Bytes(b) => self.put_bytes(b),
                other => return Err(CodecError::mismatch("bytes", other.kind())),
            },
            Shape::Time => match value {
                Value::Time(t) => {
                    put_varint(&mut self.buf, t.timestamp());
                    put_uvarint(&mut self.buf, u64::from(t.timestamp_subsec_nanos()));
                }
                other => return Err(CodecError::mismatch("time", other.kind())),
            },
            Shape::Ptr(_) => {
                check_binary_shape(shape)?;
                let (_, leaf) = shape.peel();
                self.encode_present(value, leaf)?;
            }
            Shape::List(elem) => {
                check_binary_shape(elem)?;
                let Value::List(items) = value else {
                    return Err(CodecError::mismatch("list", value.kind()));
                };
                let max = self.codec.config().max_list_len;
                if items.len() > max {
                    return Err(CodecError::ListTooLong {
                        len: items.len() as u64,
                        max,
                    });
                }
                self.enter()?;
                put_uvarint(&mut self.buf, items.len() as u64);
                for item in items {
                    self.encode(item, elem)?;
                }
                self.leave();
            }
            Shape::Map(_) | Shape::UnorderedMap(_) | Shape::Func => {
                return Err(CodecError::Unsupported(format!(
                    "{} has no binary encoding",
                    shape.describe()
                )));
            }
            Shape::Struct(s) => {
                let plan = self.codec.plans().plan_for(s)?;
                let Value::Struct(slots) = value else {
                    return Err(CodecError::mismatch("struct", value.kind()));
                };
                self.enter()?;
                for field in &plan.fields {
                    let slot = slots.get(field.slot).ok_or_else(|| {
                        CodecError::Malformed(format!(
                            "{} has no slot for field {}",
                            s.ty.name, field.name
                        ))
                    })?;
                    self.encode_field(slot, field)?;
                }
                self.leave();
            }
            Shape::Named(_, inner) | Shape::Custom(_, inner) => self.encode(value, inner)?,
            Shape::Interface(contract) => match value {
                Value::Null => self.buf.put_u8(0),
                Value::Dyn(held) => {
                    self.enter()?;
                    let (info, long_form) = self.codec.registry().resolve_member(
                        Scope::for_contract(*contract),
                        held.type_id,
                        held.type_name,
                    )?;
                    self.put_tag(&info.tag, long_form);
                    self.encode(&held.value, &(info.shape)())?;
                    self.leave();
                }
                other => return Err(CodecError::mismatch("interface", other.kind())),
            },
        }
        Ok(())
    }

    fn encode_field(&mut self, value: &Value, field: &FieldDescriptor) -> CodecResult<()> {
        if field.depth == 0 {
            return self.encode(value, &field.leaf);
        }
        check_binary_shape(&field.leaf)?;
        self.encode_present(value, &field.leaf)
    }

    /// Presence byte, then the leaf if there is one.
    fn encode_present(&mut self, value: &Value, leaf: &Shape) -> CodecResult<()> {
        if value.is_null() {
            self.buf.put_u8(0);
            Ok(())
        } else {
            self.buf.put_u8(1);
            self.encode(value, leaf)
        }
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        put_uvarint(&mut self.buf, bytes.len() as u64);
        self.buf.put_slice(bytes);
    }

    fn put_tag(&mut self, tag: &Tag, long_form: bool) {
        let bytes = if long_form { tag.as_bytes() } else { tag.prefix() };
        // Tag lengths are capped well below 256 by config validation.
        self.buf.put_u8(bytes.len() as u8);
        self.buf.put_slice(bytes);
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
