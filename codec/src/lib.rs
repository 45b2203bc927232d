// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # polycodec
//!
//! A registry-driven codec for values whose static type is an interface.
//! Concrete types are registered under stable names; each name hashes to a
//! short tag that goes on the wire in front of the value, so a decoder that
//! only knows "this is some `Vehicle`" can rebuild the right concrete type.
//!
//! Two engines share one registry and one set of field plans:
//!
//! - **binary**: compact varint encoding, deterministic, no maps, no
//!   floats unless enabled.
//! - **json**: human-readable, interfaces as `{"type": .., "value": ..}`.
//!
//! ## Modules
//!
//! - **codec**: `Codec`, the entry point for both engines.
//! - **registry**: contracts, concrete types and their tags.
//! - **plan**: cached per-struct field layouts.
//! - **wire**: the `Wire` trait and its implementations for std types.
//! - **poly**: `Poly<dyn Trait>`, the interface holder.
//! - **shape** / **value**: the type descriptors and value trees the
//!   engines walk.
//! - **config**: limits and tag layout.
//!
//! Types are described with the [`wire_struct!`] and [`wire_newtype!`]
//! macros rather than a derive; see `macros.rs`.

#[macro_use]
mod macros;

pub mod binary;
pub mod codec;
pub mod config;
pub mod error;
pub mod json;
pub mod plan;
pub mod poly;
pub mod registry;
pub mod shape;
pub mod value;
pub mod wire;

pub use crate::codec::Codec;
pub use config::{CodecConfig, TagLayout};
pub use error::{CodecError, CodecResult, ErrorClass};
pub use plan::{FieldDescriptor, FieldPlan};
pub use poly::{Poly, Registered};
pub use registry::{
    ConcreteInfo, ConcreteOptions, ContractInfo, InterfaceOptions, Tag, TypeRegistry,
};
pub use shape::{FieldSpec, Shape, StructShape, TypeRef};
pub use value::{DynValue, Value};
pub use wire::{Encoding, JsonMarshaler, Wire};
