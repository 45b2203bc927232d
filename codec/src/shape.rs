//! # Shapes
//!
//! A [`Shape`] is the static description of a type that the engines need:
//! what kind of value lives at a position, how many pointer levels wrap it,
//! and for structs, the declared field list. Shapes are produced by
//! [`Wire::shape`] and, for user types, by the `wire_struct!` and
//! `wire_newtype!` macros.
//!
//! Struct field lists are behind a function pointer, so a type that mentions
//! itself (a tree node holding a `Vec` of nodes) has a finite shape.

use std::any::{type_name, TypeId};
use std::fmt;

use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use crate::wire::{Encoding, Wire};

// ---------------------------------------------------------------------------
// TypeRef
// ---------------------------------------------------------------------------

/// Identity of a Rust type, with its name kept around for messages.
#[derive(Clone, Copy)]
pub struct TypeRef {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeRef {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeRef {}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ---------------------------------------------------------------------------
// Shape
// ---------------------------------------------------------------------------

/// Static description of a wire position.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Bool,
    Int,
    Uint,
    Float,
    Str,
    Bytes,
    Time,
    /// One nil-able level of indirection.
    Ptr(Box<Shape>),
    List(Box<Shape>),
    /// Map with an ordering guarantee on its keys.
    Map(Box<Shape>),
    /// Map without one. JSON sorts the keys; binary refuses both kinds.
    UnorderedMap(Box<Shape>),
    /// A callable. Never encodable.
    Func,
    Struct(StructShape),
    /// A user newtype over another shape.
    Named(TypeRef, Box<Shape>),
    /// Interface contract position; the payload's shape comes from the
    /// registry.
    Interface(TypeRef),
    /// A type with its own JSON marshaler. Binary uses the inner shape.
    Custom(TypeRef, Box<Shape>),
}

impl Shape {
    /// Strip pointer levels, returning how many there were and the leaf.
    pub fn peel(&self) -> (usize, &Shape) {
        let mut depth = 0;
        let mut shape = self;
        while let Shape::Ptr(inner) = shape {
            depth += 1;
            shape = inner;
        }
        (depth, shape)
    }

    /// The user type this shape names, if any.
    pub fn type_ref(&self) -> Option<TypeRef> {
        match self {
            Shape::Struct(s) => Some(s.ty),
            Shape::Named(ty, _) | Shape::Custom(ty, _) => Some(*ty),
            _ => None,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Shape::Map(_) | Shape::UnorderedMap(_))
    }

    pub fn describe(&self) -> String {
        match self {
            Shape::Bool => "bool".into(),
            Shape::Int => "int".into(),
            Shape::Uint => "uint".into(),
            Shape::Float => "float".into(),
            Shape::Str => "string".into(),
            Shape::Bytes => "bytes".into(),
            Shape::Time => "time".into(),
            Shape::Ptr(inner) => format!("*{}", inner.describe()),
            Shape::List(inner) => format!("[]{}", inner.describe()),
            Shape::Map(inner) => format!("map[string]{}", inner.describe()),
            Shape::UnorderedMap(inner) => format!("unordered map[string]{}", inner.describe()),
            Shape::Func => "func".into(),
            Shape::Struct(s) => s.ty.name.into(),
            Shape::Named(ty, _) | Shape::Custom(ty, _) | Shape::Interface(ty) => ty.name.into(),
        }
    }
}

/// A struct type: its identity and a lazily-evaluated field list.
#[derive(Clone)]
pub struct StructShape {
    pub ty: TypeRef,
    pub fields: fn() -> Vec<FieldSpec>,
}

impl StructShape {
    pub fn new<T: 'static>(fields: fn() -> Vec<FieldSpec>) -> Self {
        Self {
            ty: TypeRef::of::<T>(),
            fields,
        }
    }
}

impl PartialEq for StructShape {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
    }
}

impl fmt::Debug for StructShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructShape").field("ty", &self.ty).finish()
    }
}

// ---------------------------------------------------------------------------
// FieldSpec
// ---------------------------------------------------------------------------

/// One declared struct field, as written in the type definition.
#[derive(Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub rename: Option<&'static str>,
    pub exported: bool,
    pub omit_empty: bool,
    pub embedded: bool,
    pub shape: fn() -> Shape,
}

impl FieldSpec {
    pub fn new<T: Wire>(name: &'static str, exported: bool) -> Self {
        Self {
            name,
            rename: None,
            exported,
            omit_empty: false,
            embedded: false,
            shape: T::shape,
        }
    }

    /// Use `wire_name` instead of the field name.
    pub fn rename(mut self, wire_name: &'static str) -> Self {
        self.rename = Some(wire_name);
        self
    }

    /// Leave the field out of JSON when it holds its zero value.
    pub fn omitempty(mut self) -> Self {
        self.omit_empty = true;
        self
    }

    /// Mark the field as anonymous. Struct fields marked this way have their
    /// own fields promoted into the parent JSON object.
    pub fn embed(mut self) -> Self {
        self.embedded = true;
        self
    }

    pub fn wire_name(&self) -> &'static str {
        self.rename.unwrap_or(self.name)
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("rename", &self.rename)
            .field("exported", &self.exported)
            .field("omit_empty", &self.omit_empty)
            .field("embedded", &self.embedded)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Macro Support
// ---------------------------------------------------------------------------

/// Visibility check on the stringified `vis` fragment of a field. Only plain
/// `pub` fields are on the wire.
#[doc(hidden)]
pub fn is_exported(vis: &str) -> bool {
    vis.trim() == "pub"
}

/// Lower one field for `Value::Struct`. Unexported fields occupy a `Null`
/// slot.
#[doc(hidden)]
pub fn field_value<T: Wire>(field: &T, vis: &str, enc: Encoding) -> CodecResult<Value> {
    if is_exported(vis) {
        field.to_value(enc)
    } else {
        Ok(Value::Null)
    }
}

/// Hands out the slots of a decoded struct value one field at a time.
#[doc(hidden)]
pub struct StructSlots {
    slots: std::vec::IntoIter<Value>,
}

impl StructSlots {
    /// `Null` stands for the all-zero struct.
    pub fn new(value: Value, type_name: &'static str) -> CodecResult<Self> {
        match value {
            Value::Struct(slots) => Ok(Self {
                slots: slots.into_iter(),
            }),
            Value::Null => Ok(Self {
                slots: Vec::new().into_iter(),
            }),
            other => Err(CodecError::mismatch(type_name, other.kind())),
        }
    }

    /// Next field. Unexported and missing slots decode from `Null`, which
    /// every `Wire` type maps to its zero value.
    pub fn take<T: Wire>(&mut self, vis: &str, codec: &Codec) -> CodecResult<T> {
        let slot = self.slots.next().unwrap_or(Value::Null);
        if is_exported(vis) {
            T::from_value(slot, codec)
        } else {
            T::from_value(Value::Null, codec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peel_counts_pointer_levels() {
        let shape = Shape::Ptr(Box::new(Shape::Ptr(Box::new(Shape::Int))));
        let (depth, leaf) = shape.peel();
        assert_eq!(depth, 2);
        assert_eq!(leaf, &Shape::Int);

        assert_eq!(Shape::Str.peel(), (0, &Shape::Str));
    }

    #[test]
    fn only_plain_pub_is_exported() {
        assert!(is_exported("pub"));
        assert!(!is_exported(""));
        assert!(!is_exported("pub(crate)"));
        assert!(!is_exported("pub (crate)"));
    }

    #[test]
    fn field_spec_builders() {
        let spec = FieldSpec::new::<i64>("count", true).rename("n").omitempty();
        assert_eq!(spec.wire_name(), "n");
        assert!(spec.omit_empty);
        assert!(!spec.embedded);
        assert_eq!((spec.shape)(), Shape::Int);
    }

    #[test]
    fn describe_is_readable() {
        let shape = Shape::List(Box::new(Shape::Ptr(Box::new(Shape::Bytes))));
        assert_eq!(shape.describe(), "[]*bytes");
    }
}
