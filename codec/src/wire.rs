//! # The `Wire` Trait
//!
//! Anything the codec can encode implements [`Wire`]. Implementations for
//! the standard building blocks live here; user structs and newtypes get
//! theirs from `wire_struct!` and `wire_newtype!`.
//!
//! | Rust type                | Shape                    |
//! |--------------------------|--------------------------|
//! | `bool`                   | `Bool`                   |
//! | `i8`..`i64`              | `Int`                    |
//! | `u8`..`u64`              | `Uint`                   |
//! | `f32`, `f64`             | `Float`                  |
//! | `String`                 | `Str`                    |
//! | `bytes::Bytes`           | `Bytes`                  |
//! | `DateTime<Utc>`          | `Time`                   |
//! | `Option<T>`              | `Ptr(T)`                 |
//! | `Box<T>`                 | same as `T`              |
//! | `Vec<T>`                 | `List(T)`                |
//! | `BTreeMap<String, V>`    | `Map(V)`                 |
//! | `HashMap<String, V>`     | `UnorderedMap(V)`        |
//! | `fn()`                   | `Func`                   |
//! | `Poly<dyn I>`            | `Interface(I)`           |
//!
//! Every implementation decodes `Value::Null` to its zero value. That single
//! rule covers missing JSON keys, explicit `null`s in non-pointer positions
//! and unexported struct fields.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::shape::Shape;
use crate::value::Value;

/// Which engine a value is being lowered for. Only types with a custom JSON
/// marshaler care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Binary,
    Json,
}

/// A type the codec can encode and decode.
pub trait Wire: Sized + 'static {
    /// Static description of this type.
    fn shape() -> Shape;

    /// Lower `self` into a [`Value`].
    fn to_value(&self, enc: Encoding) -> CodecResult<Value>;

    /// Rebuild from a [`Value`]. The codec resolves interface payloads.
    fn from_value(value: Value, codec: &Codec) -> CodecResult<Self>;
}

/// Full override of a type's JSON form.
///
/// When a type declares one (`custom_json;` in the declaring macro), the
/// JSON engine hands the whole subtree to it. The binary engine keeps using
/// the structural encoding.
pub trait JsonMarshaler: Sized {
    fn marshal_json(&self) -> CodecResult<serde_json::Value>;
    fn unmarshal_json(json: serde_json::Value) -> CodecResult<Self>;
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

impl Wire for bool {
    fn shape() -> Shape {
        Shape::Bool
    }

    fn to_value(&self, _enc: Encoding) -> CodecResult<Value> {
        Ok(Value::Bool(*self))
    }

    fn from_value(value: Value, _codec: &Codec) -> CodecResult<Self> {
        match value {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(b),
            other => Err(CodecError::mismatch("bool", other.kind())),
        }
    }
}

macro_rules! impl_wire_signed {
    ($($t:ty),*) => {$(
        impl Wire for $t {
            fn shape() -> Shape {
                Shape::Int
            }

            fn to_value(&self, _enc: Encoding) -> CodecResult<Value> {
                Ok(Value::Int(i64::from(*self)))
            }

            fn from_value(value: Value, _codec: &Codec) -> CodecResult<Self> {
                if value.is_null() {
                    return Ok(0);
                }
                let wide = value.as_i64()?;
                <$t>::try_from(wide).map_err(|_| {
                    CodecError::Malformed(format!("{wide} does not fit in {}", stringify!($t)))
                })
            }
        }
    )*};
}

macro_rules! impl_wire_unsigned {
    ($($t:ty),*) => {$(
        impl Wire for $t {
            fn shape() -> Shape {
                Shape::Uint
            }

            fn to_value(&self, _enc: Encoding) -> CodecResult<Value> {
                Ok(Value::Uint(u64::from(*self)))
            }

            fn from_value(value: Value, _codec: &Codec) -> CodecResult<Self> {
                if value.is_null() {
                    return Ok(0);
                }
                let wide = value.as_u64()?;
                <$t>::try_from(wide).map_err(|_| {
                    CodecError::Malformed(format!("{wide} does not fit in {}", stringify!($t)))
                })
            }
        }
    )*};
}

impl_wire_signed!(i8, i16, i32, i64);
impl_wire_unsigned!(u8, u16, u32, u64);

impl Wire for f64 {
    fn shape() -> Shape {
        Shape::Float
    }

    fn to_value(&self, _enc: Encoding) -> CodecResult<Value> {
        Ok(Value::Float(*self))
    }

    fn from_value(value: Value, _codec: &Codec) -> CodecResult<Self> {
        match value {
            Value::Null => Ok(0.0),
            Value::Float(f) => Ok(f),
            other => Err(CodecError::mismatch("float", other.kind())),
        }
    }
}

impl Wire for f32 {
    fn shape() -> Shape {
        Shape::Float
    }

    fn to_value(&self, _enc: Encoding) -> CodecResult<Value> {
        Ok(Value::Float(f64::from(*self)))
    }

    fn from_value(value: Value, codec: &Codec) -> CodecResult<Self> {
        let wide = f64::from_value(value, codec)?;
        if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
            return Err(CodecError::Malformed(format!("{wide} does not fit in f32")));
        }
        Ok(wide as f32)
    }
}

impl Wire for String {
    fn shape() -> Shape {
        Shape::Str
    }

    fn to_value(&self, _enc: Encoding) -> CodecResult<Value> {
        Ok(Value::Str(self.clone()))
    }

    fn from_value(value: Value, _codec: &Codec) -> CodecResult<Self> {
        match value {
            Value::Null => Ok(String::new()),
            Value::Str(s) => Ok(s),
            other => Err(CodecError::mismatch("string", other.kind())),
        }
    }
}

impl Wire for Bytes {
    fn shape() -> Shape {
        Shape::Bytes
    }

    fn to_value(&self, _enc: Encoding) -> CodecResult<Value> {
        Ok(Value::Bytes(self.clone()))
    }

    fn from_value(value: Value, _codec: &Codec) -> CodecResult<Self> {
        match value {
            Value::Null => Ok(Bytes::new()),
            Value::Bytes(b) => Ok(b),
            other => Err(CodecError::mismatch("bytes", other.kind())),
        }
    }
}

impl Wire for DateTime<Utc> {
    fn shape() -> Shape {
        Shape::Time
    }

    fn to_value(&self, _enc: Encoding) -> CodecResult<Value> {
        Ok(Value::Time(*self))
    }

    fn from_value(value: Value, _codec: &Codec) -> CodecResult<Self> {
        match value {
            Value::Null => Ok(DateTime::<Utc>::default()),
            Value::Time(t) => Ok(t),
            other => Err(CodecError::mismatch("time", other.kind())),
        }
    }
}

// ---------------------------------------------------------------------------
// Indirection
// ---------------------------------------------------------------------------

/// Each `Option` is one nil-able pointer level. A `None` anywhere in a chain
/// lowers to `Null` and decodes as `None` at the outermost level.
impl<T: Wire> Wire for Option<T> {
    fn shape() -> Shape {
        Shape::Ptr(Box::new(T::shape()))
    }

    fn to_value(&self, enc: Encoding) -> CodecResult<Value> {
        match self {
            Some(inner) => inner.to_value(enc),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: Value, codec: &Codec) -> CodecResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other, codec).map(Some),
        }
    }
}

/// `Box` is an ownership detail, not a pointer level.
impl<T: Wire> Wire for Box<T> {
    fn shape() -> Shape {
        T::shape()
    }

    fn to_value(&self, enc: Encoding) -> CodecResult<Value> {
        (**self).to_value(enc)
    }

    fn from_value(value: Value, codec: &Codec) -> CodecResult<Self> {
        T::from_value(value, codec).map(Box::new)
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

impl<T: Wire> Wire for Vec<T> {
    fn shape() -> Shape {
        Shape::List(Box::new(T::shape()))
    }

    fn to_value(&self, enc: Encoding) -> CodecResult<Value> {
        self.iter()
            .map(|item| item.to_value(enc))
            .collect::<CodecResult<Vec<_>>>()
            .map(Value::List)
    }

    fn from_value(value: Value, codec: &Codec) -> CodecResult<Self> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::List(items) => items
                .into_iter()
                .map(|item| T::from_value(item, codec))
                .collect(),
            other => Err(CodecError::mismatch("list", other.kind())),
        }
    }
}

fn map_entries(value: Value) -> CodecResult<BTreeMap<String, Value>> {
    match value {
        Value::Null => Ok(BTreeMap::new()),
        Value::Map(entries) => Ok(entries),
        other => Err(CodecError::mismatch("map", other.kind())),
    }
}

impl<V: Wire> Wire for BTreeMap<String, V> {
    fn shape() -> Shape {
        Shape::Map(Box::new(V::shape()))
    }

    fn to_value(&self, enc: Encoding) -> CodecResult<Value> {
        let mut entries = BTreeMap::new();
        for (key, item) in self {
            entries.insert(key.clone(), item.to_value(enc)?);
        }
        Ok(Value::Map(entries))
    }

    fn from_value(value: Value, codec: &Codec) -> CodecResult<Self> {
        map_entries(value)?
            .into_iter()
            .map(|(key, item)| Ok((key, V::from_value(item, codec)?)))
            .collect()
    }
}

impl<V: Wire> Wire for HashMap<String, V> {
    fn shape() -> Shape {
        Shape::UnorderedMap(Box::new(V::shape()))
    }

    fn to_value(&self, enc: Encoding) -> CodecResult<Value> {
        let mut entries = BTreeMap::new();
        for (key, item) in self {
            entries.insert(key.clone(), item.to_value(enc)?);
        }
        Ok(Value::Map(entries))
    }

    fn from_value(value: Value, codec: &Codec) -> CodecResult<Self> {
        map_entries(value)?
            .into_iter()
            .map(|(key, item)| Ok((key, V::from_value(item, codec)?)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Callables
// ---------------------------------------------------------------------------

impl Wire for fn() {
    fn shape() -> Shape {
        Shape::Func
    }

    fn to_value(&self, _enc: Encoding) -> CodecResult<Value> {
        Err(CodecError::Unsupported("callable values cannot be encoded".into()))
    }

    fn from_value(_value: Value, _codec: &Codec) -> CodecResult<Self> {
        Err(CodecError::Unsupported("callable values cannot be decoded".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_decodes_to_zero() {
        let codec = Codec::new();
        assert_eq!(i32::from_value(Value::Null, &codec).unwrap(), 0);
        assert_eq!(String::from_value(Value::Null, &codec).unwrap(), "");
        assert_eq!(
            Vec::<u8>::from_value(Value::Null, &codec).unwrap(),
            Vec::<u8>::new()
        );
        assert_eq!(Option::<i64>::from_value(Value::Null, &codec).unwrap(), None);
    }

    #[test]
    fn narrow_integers_reject_overflow() {
        let codec = Codec::new();
        assert_eq!(i8::from_value(Value::Int(-128), &codec).unwrap(), -128);
        assert!(i8::from_value(Value::Int(300), &codec).is_err());
        assert!(u16::from_value(Value::Uint(70_000), &codec).is_err());
    }

    #[test]
    fn f32_rejects_values_it_cannot_hold() {
        let codec = Codec::new();
        assert_eq!(f32::from_value(Value::Float(1.5), &codec).unwrap(), 1.5);
        assert_eq!(
            f32::from_value(Value::Float(f64::from(f32::MAX)), &codec).unwrap(),
            f32::MAX
        );
        assert!(matches!(
            f32::from_value(Value::Float(1e39), &codec),
            Err(CodecError::Malformed(_))
        ));
        assert!(f32::from_value(Value::Float(-1e300), &codec).is_err());
        assert!(f32::from_value(Value::Float(f64::INFINITY), &codec)
            .unwrap()
            .is_infinite());
    }

    #[test]
    fn nested_options_collapse_on_lowering() {
        let inner_nil: Option<Option<i64>> = Some(None);
        assert_eq!(inner_nil.to_value(Encoding::Binary).unwrap(), Value::Null);

        let codec = Codec::new();
        let back = Option::<Option<i64>>::from_value(Value::Int(3), &codec).unwrap();
        assert_eq!(back, Some(Some(3)));
    }

    #[test]
    fn box_is_transparent() {
        assert_eq!(<Box<String>>::shape(), Shape::Str);
    }

    #[test]
    fn hash_maps_lower_in_key_order() {
        let mut map = HashMap::new();
        map.insert("b".to_string(), 2u32);
        map.insert("a".to_string(), 1u32);
        let Value::Map(entries) = map.to_value(Encoding::Json).unwrap() else {
            panic!("expected a map value");
        };
        let keys: Vec<_> = entries.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn callables_are_unsupported() {
        fn noop() {}
        let f: fn() = noop;
        let err = f.to_value(Encoding::Json).unwrap_err();
        assert!(err.is_programmer_error());
    }
}
