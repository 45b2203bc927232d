//! # Binary Engine
//!
//! Compact, schema-driven encoding. Nothing on the wire names a field; the
//! decoder recovers structure from the destination type's shape and field
//! plan, and concrete types behind interfaces from their tags.
//!
//! ## Layout
//!
//! | Shape        | Bytes                                                   |
//! |--------------|---------------------------------------------------------|
//! | bool         | `0x00` / `0x01`                                         |
//! | int          | zig-zag varint                                          |
//! | uint         | varint                                                  |
//! | float        | 8 bytes little-endian (only with `allow_floats`)        |
//! | string/bytes | varint length, then the bytes                           |
//! | time         | zig-zag varint seconds, varint nanoseconds              |
//! | pointer      | `0x00` for nil, else `0x01` then the leaf               |
//! | list         | varint count, then the elements                         |
//! | struct       | exported fields in declaration order                    |
//! | interface    | tag length byte (`0` = nil), tag bytes, payload          |
//!
//! A pointer chain writes one presence byte no matter how deep it is.
//! An interface tag is either the short prefix or the full tag; see
//! [`registry`](crate::registry) for when each is used.
//!
//! Maps and callables have no binary form. Pointers to interfaces are
//! rejected too. Each of these fails with `Unsupported` as soon as the shape
//! is reached, whether or not the value is nil.

mod decode;
mod encode;
pub mod varint;

pub use decode::BinaryDecoder;
pub use encode::BinaryEncoder;

use crate::error::{CodecError, CodecResult};
use crate::shape::Shape;

/// Reject shapes the binary engine cannot carry. Looks through pointers,
/// lists and newtypes; struct fields are checked as they are reached.
pub(crate) fn check_binary_shape(shape: &Shape) -> CodecResult<()> {
    let (depth, leaf) = shape.peel();
    match leaf {
        Shape::Map(_) | Shape::UnorderedMap(_) | Shape::Func => Err(CodecError::Unsupported(
            format!("{} has no binary encoding", leaf.describe()),
        )),
        Shape::Interface(contract) if depth > 0 => Err(CodecError::Unsupported(format!(
            "pointer to interface {contract}"
        ))),
        Shape::List(elem) => check_binary_shape(elem),
        Shape::Named(_, inner) | Shape::Custom(_, inner) => check_binary_shape(inner),
        _ => Ok(()),
    }
}
