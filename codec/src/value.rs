//! # Value Tree
//!
//! The intermediate form both engines walk. [`Wire::to_value`](crate::Wire)
//! lowers a typed value into a `Value`; the engines turn it into bytes or
//! JSON guided by the type's [`Shape`](crate::Shape), and the reverse path
//! produces a `Value` that [`Wire::from_value`](crate::Wire) rebuilds.
//!
//! A `Value` carries no names. Struct values are positional, one slot per
//! declared field, and the field plan decides which slots go on the wire
//! and under which name.

use std::any::TypeId;
use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::{CodecError, CodecResult};

/// A dynamically-typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Nil pointer, nil interface, missing key, or an unexported slot.
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Bytes(Bytes),
    Time(DateTime<Utc>),
    List(Vec<Value>),
    /// String-keyed map. Always iterated in key order.
    Map(BTreeMap<String, Value>),
    /// One slot per declared field, in declaration order.
    Struct(Vec<Value>),
    /// A value behind an interface, with its concrete type identity.
    Dyn(Box<DynValue>),
    /// Pre-rendered JSON from a custom marshaler.
    Json(serde_json::Value),
}

/// The concrete payload of an interface-typed position.
#[derive(Debug, Clone, PartialEq)]
pub struct DynValue {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub value: Value,
}

impl Value {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Time(_) => "time",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Struct(_) => "struct",
            Value::Dyn(_) => "interface",
            Value::Json(_) => "json",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether an `omitempty` field holding this value is left out.
    ///
    /// Structs, timestamps and non-nil interfaces are never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Uint(u) => *u == 0,
            Value::Float(f) => *f == 0.0,
            Value::Str(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(entries) => entries.is_empty(),
            Value::Json(json) => json.is_null(),
            Value::Time(_) | Value::Struct(_) | Value::Dyn(_) => false,
        }
    }

    /// Signed view, accepting unsigned values that fit.
    pub fn as_i64(&self) -> CodecResult<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::Uint(u) => i64::try_from(*u)
                .map_err(|_| CodecError::Malformed(format!("{u} overflows a signed integer"))),
            other => Err(CodecError::mismatch("int", other.kind())),
        }
    }

    /// Unsigned view, accepting non-negative signed values.
    pub fn as_u64(&self) -> CodecResult<u64> {
        match self {
            Value::Uint(u) => Ok(*u),
            Value::Int(i) => u64::try_from(*i)
                .map_err(|_| CodecError::Malformed(format!("{i} is negative"))),
            other => Err(CodecError::mismatch("uint", other.kind())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emptiness_follows_zero_values() {
        assert!(Value::Null.is_empty());
        assert!(Value::Int(0).is_empty());
        assert!(Value::Str(String::new()).is_empty());
        assert!(Value::List(vec![]).is_empty());
        assert!(!Value::Int(7).is_empty());
        assert!(!Value::Struct(vec![]).is_empty());
        assert!(!Value::Time(DateTime::<Utc>::default()).is_empty());
    }

    #[test]
    fn integer_views_check_range() {
        assert_eq!(Value::Uint(5).as_i64().unwrap(), 5);
        assert!(Value::Uint(u64::MAX).as_i64().is_err());
        assert!(Value::Int(-1).as_u64().is_err());
        assert!(matches!(
            Value::Str("1".into()).as_i64(),
            Err(CodecError::Mismatch { expected: "int", .. })
        ));
    }
}
