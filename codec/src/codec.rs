//! # Codec
//!
//! The public entry point. A `Codec` owns a [`TypeRegistry`] and a
//! [`PlanCache`] and exposes the marshal/unmarshal operations of both
//! engines. There is no global instance: build one at startup, register
//! everything, then share it by reference or `Arc`.
//!
//! ```ignore
//! let codec = Codec::new();
//! codec.register_interface::<dyn Vehicle>(InterfaceOptions::default())?;
//! codec.register_concrete::<Car>("car", ConcreteOptions::default())?;
//! register_implementations!(codec, dyn Vehicle => Car)?;
//!
//! let v = Poly::<dyn Vehicle>::new(Box::new(Car("Tesla".into())));
//! let json = codec.marshal_json(&v)?;
//! let back: Poly<dyn Vehicle> = codec.unmarshal_json(&json)?;
//! ```
//!
//! ## Top-level values
//!
//! Pointer levels around the top-level value are transparent: `x`, `Some(x)`
//! and `Some(Some(x))` encode identically. A top-level value whose type is a
//! registered concrete (with `tag_top_level` set) is tagged exactly as it
//! would be behind an interface.

use std::sync::Arc;

use crate::binary::{varint, BinaryDecoder, BinaryEncoder};
use crate::config::CodecConfig;
use crate::error::{CodecError, CodecResult};
use crate::json;
use crate::plan::{FieldPlan, PlanCache};
use crate::poly::Registered;
use crate::registry::{ConcreteInfo, ConcreteOptions, InterfaceOptions, Tag, TypeRegistry};
use crate::shape::Shape;
use crate::wire::{Encoding, Wire};

/// Registry-driven binary and JSON codec.
#[derive(Debug)]
pub struct Codec {
    config: CodecConfig,
    registry: TypeRegistry,
    plans: PlanCache,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec {
    /// A codec with the default config.
    pub fn new() -> Self {
        let config = CodecConfig::default();
        Self {
            registry: TypeRegistry::new(config.tag_layout),
            plans: PlanCache::new(),
            config,
        }
    }

    /// A codec with a custom config. Invalid configs are rejected up front.
    pub fn with_config(config: CodecConfig) -> CodecResult<Self> {
        config.validate()?;
        Ok(Self {
            registry: TypeRegistry::new(config.tag_layout),
            plans: PlanCache::new(),
            config,
        })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub(crate) fn plans(&self) -> &PlanCache {
        &self.plans
    }

    // -- Registration -------------------------------------------------------

    /// Register a concrete type under a wire name. Returns its tag.
    pub fn register_concrete<C: Wire + Send + Sync>(
        &self,
        name: &str,
        options: ConcreteOptions,
    ) -> CodecResult<Tag> {
        self.registry.register_concrete::<C>(name, options)
    }

    /// Register an interface contract, given as `dyn Trait`.
    pub fn register_interface<I: ?Sized + Registered>(
        &self,
        options: InterfaceOptions,
    ) -> CodecResult<()> {
        self.registry.register_interface::<I>(options)
    }

    /// Make a registered concrete type a member of a registered contract.
    /// See also [`register_implementations!`](crate::register_implementations).
    pub fn register_implementation<I, C>(&self, upcast: fn(C) -> Box<I>) -> CodecResult<()>
    where
        I: ?Sized + Registered,
        C: Wire + Send + Sync,
    {
        self.registry.register_implementation::<I, C>(upcast)
    }

    /// Tag of a registered concrete type.
    pub fn tag_of<T: 'static>(&self) -> Option<Tag> {
        self.registry.tag_of::<T>()
    }

    /// Cached field plan of a struct type, building it if needed.
    pub fn field_plan<T: Wire>(&self) -> CodecResult<Arc<FieldPlan>> {
        match T::shape().peel().1 {
            Shape::Struct(s) => self.plans.plan_for(s),
            Shape::Custom(_, inner) | Shape::Named(_, inner) => match inner.peel().1 {
                Shape::Struct(s) => self.plans.plan_for(s),
                other => Err(CodecError::mismatch("struct", other.describe())),
            },
            other => Err(CodecError::mismatch("struct", other.describe())),
        }
    }

    /// The registry entry that tags `shape` at the top level, if any.
    pub(crate) fn top_level_concrete(&self, shape: &Shape) -> Option<ConcreteInfo> {
        let ty = shape.type_ref()?;
        self.registry
            .concrete_by_type(ty.id)
            .filter(|info| info.options.tag_top_level)
    }

    // -- Binary -------------------------------------------------------------

    /// Binary encoding, prefixed with its length as a varint.
    pub fn marshal_binary<T: Wire>(&self, value: &T) -> CodecResult<Vec<u8>> {
        let bare = self.marshal_binary_bare(value)?;
        let len = bare.len() as u64;
        let mut framed = Vec::with_capacity(varint::uvarint_size(len) + bare.len());
        varint::put_uvarint(&mut framed, len);
        framed.extend_from_slice(&bare);
        Ok(framed)
    }

    /// Binary encoding without the length prefix.
    pub fn marshal_binary_bare<T: Wire>(&self, value: &T) -> CodecResult<Vec<u8>> {
        let shape = T::shape();
        let lowered = value.to_value(Encoding::Binary)?;
        let mut encoder = BinaryEncoder::new(self);
        encoder.encode_top_level(&lowered, &shape)?;
        Ok(encoder.finish())
    }

    /// Decode a length-prefixed binary encoding.
    pub fn unmarshal_binary<T: Wire>(&self, bytes: &[u8]) -> CodecResult<T> {
        let (len, used) = varint::read_uvarint(bytes)?;
        let body = &bytes[used..];
        let len = usize::try_from(len)
            .map_err(|_| CodecError::Malformed(format!("length prefix {len} is too large")))?;
        if body.len() < len {
            return Err(CodecError::Truncated {
                needed: len - body.len(),
            });
        }
        if body.len() > len {
            return Err(CodecError::TrailingBytes(body.len() - len));
        }
        self.unmarshal_binary_bare(body)
    }

    /// Decode a binary encoding without a length prefix. The whole input
    /// must be consumed.
    pub fn unmarshal_binary_bare<T: Wire>(&self, bytes: &[u8]) -> CodecResult<T> {
        let shape = T::shape();
        let mut decoder = BinaryDecoder::new(self, bytes);
        let value = decoder.decode_top_level(&shape)?;
        decoder.finish()?;
        T::from_value(value, self)
    }

    /// Like [`unmarshal_binary`](Self::unmarshal_binary), writing into `dst`.
    /// On failure `dst` is left untouched.
    pub fn unmarshal_binary_into<T: Wire>(&self, bytes: &[u8], dst: &mut T) -> CodecResult<()> {
        *dst = self.unmarshal_binary(bytes)?;
        Ok(())
    }

    pub fn unmarshal_binary_bare_into<T: Wire>(
        &self,
        bytes: &[u8],
        dst: &mut T,
    ) -> CodecResult<()> {
        *dst = self.unmarshal_binary_bare(bytes)?;
        Ok(())
    }

    // -- JSON ---------------------------------------------------------------

    /// Compact JSON text.
    pub fn marshal_json<T: Wire>(&self, value: &T) -> CodecResult<String> {
        let tree = self.marshal_json_value(value)?;
        Ok(serde_json::to_string(&tree)?)
    }

    /// Indented JSON text. Every line after the first starts with `prefix`,
    /// followed by one `indent` per nesting level.
    pub fn marshal_json_indent<T: Wire>(
        &self,
        value: &T,
        prefix: &str,
        indent: &str,
    ) -> CodecResult<String> {
        let tree = self.marshal_json_value(value)?;
        json::to_indented_string(&tree, prefix, indent)
    }

    /// The JSON tree, before rendering to text.
    pub fn marshal_json_value<T: Wire>(&self, value: &T) -> CodecResult<serde_json::Value> {
        let shape = T::shape();
        let lowered = value.to_value(Encoding::Json)?;
        json::JsonEncoder::new(self).encode_top_level(&lowered, &shape)
    }

    /// Decode JSON text.
    pub fn unmarshal_json<T: Wire>(&self, text: &str) -> CodecResult<T> {
        let tree: serde_json::Value = serde_json::from_str(text)?;
        self.unmarshal_json_value(tree)
    }

    /// Decode JSON bytes.
    pub fn unmarshal_json_slice<T: Wire>(&self, bytes: &[u8]) -> CodecResult<T> {
        let tree: serde_json::Value = serde_json::from_slice(bytes)?;
        self.unmarshal_json_value(tree)
    }

    /// Decode an already-parsed JSON tree.
    pub fn unmarshal_json_value<T: Wire>(&self, tree: serde_json::Value) -> CodecResult<T> {
        let shape = T::shape();
        let value = json::JsonDecoder::new(self).decode_top_level(tree, &shape)?;
        T::from_value(value, self)
    }

    /// Like [`unmarshal_json`](Self::unmarshal_json), writing into `dst`.
    /// On failure `dst` is left untouched.
    pub fn unmarshal_json_into<T: Wire>(&self, text: &str, dst: &mut T) -> CodecResult<()> {
        *dst = self.unmarshal_json(text)?;
        Ok(())
    }
}
