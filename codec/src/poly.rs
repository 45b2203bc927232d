//! # Interface Values
//!
//! An interface contract is an ordinary object-safe trait with
//! [`Registered`] as a supertrait:
//!
//! ```ignore
//! pub trait Vehicle: Registered {
//!     fn wheels(&self) -> u32;
//! }
//! ```
//!
//! A field of type `Poly<dyn Vehicle>` is then an interface-typed position.
//! On encode the codec asks the boxed value for its concrete type and looks
//! up its tag; on decode it reads the tag and calls the constructor the
//! registry holds for that `(contract, concrete)` pair.
//!
//! `Poly<dyn Registered>` is the catch-all interface: every registered
//! concrete type is a member without any extra registration.

use std::any::{type_name, Any, TypeId};
use std::fmt;

use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::shape::{Shape, TypeRef};
use crate::value::{DynValue, Value};
use crate::wire::{Encoding, Wire};

/// Runtime identity of a value held behind an interface.
///
/// Implemented for every [`Wire`] type; never implement it by hand.
pub trait Registered: Send + Sync + 'static {
    fn concrete_type_id(&self) -> TypeId;
    fn concrete_type_name(&self) -> &'static str;
    fn concrete_value(&self, enc: Encoding) -> CodecResult<Value>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Wire + Send + Sync> Registered for T {
    fn concrete_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn concrete_type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn concrete_value(&self, enc: Encoding) -> CodecResult<Value> {
        self.to_value(enc)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A nil-able interface value.
pub struct Poly<I: ?Sized + Registered>(Option<Box<I>>);

impl<I: ?Sized + Registered> Poly<I> {
    pub fn new(value: Box<I>) -> Self {
        Self(Some(value))
    }

    pub fn nil() -> Self {
        Self(None)
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_none()
    }

    pub fn get(&self) -> Option<&I> {
        self.0.as_deref()
    }

    pub fn into_inner(self) -> Option<Box<I>> {
        self.0
    }

    /// Borrow the held value as its concrete type.
    pub fn downcast_ref<C: 'static>(&self) -> Option<&C> {
        self.get().and_then(|held| held.as_any().downcast_ref::<C>())
    }

    /// Name of the concrete type currently held.
    pub fn concrete_type_name(&self) -> Option<&'static str> {
        self.get().map(|held| held.concrete_type_name())
    }
}

impl<I: ?Sized + Registered> Default for Poly<I> {
    fn default() -> Self {
        Self::nil()
    }
}

impl<I: ?Sized + Registered> From<Box<I>> for Poly<I> {
    fn from(value: Box<I>) -> Self {
        Self::new(value)
    }
}

impl<I: ?Sized + Registered> fmt::Debug for Poly<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            None => f.write_str("Poly(nil)"),
            Some(held) => match held.concrete_value(Encoding::Binary) {
                Ok(value) => write!(f, "Poly<{}>({:?})", held.concrete_type_name(), value),
                Err(_) => write!(f, "Poly<{}>(..)", held.concrete_type_name()),
            },
        }
    }
}

/// Same concrete type and field-wise equal payload.
impl<I: ?Sized + Registered> PartialEq for Poly<I> {
    fn eq(&self, other: &Self) -> bool {
        match (self.get(), other.get()) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                a.concrete_type_id() == b.concrete_type_id()
                    && matches!(
                        (a.concrete_value(Encoding::Binary), b.concrete_value(Encoding::Binary)),
                        (Ok(x), Ok(y)) if x == y
                    )
            }
            _ => false,
        }
    }
}

impl<I: ?Sized + Registered> Wire for Poly<I> {
    fn shape() -> Shape {
        Shape::Interface(TypeRef::of::<I>())
    }

    fn to_value(&self, enc: Encoding) -> CodecResult<Value> {
        let Some(held) = self.get() else {
            return Ok(Value::Null);
        };
        Ok(Value::Dyn(Box::new(DynValue {
            type_id: held.concrete_type_id(),
            type_name: held.concrete_type_name(),
            value: held.concrete_value(enc)?,
        })))
    }

    fn from_value(value: Value, codec: &Codec) -> CodecResult<Self> {
        match value {
            Value::Null => Ok(Self::nil()),
            Value::Dyn(held) => {
                let DynValue {
                    type_id,
                    type_name,
                    value,
                } = *held;
                let construct = codec.registry().constructor::<I>(type_id, type_name)?;
                construct(value, codec).map(Self::new)
            }
            other => Err(CodecError::mismatch("interface", other.kind())),
        }
    }
}
