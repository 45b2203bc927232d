//! # JSON Engine
//!
//! Human-readable encoding over `serde_json::Value`. Same field plans and
//! registry as the binary engine, different rules:
//!
//! - Struct fields become object keys under their wire names, in
//!   declaration order. `omitempty` fields holding a zero value are left
//!   out. Promoted embedded fields are spliced into the parent object.
//! - Interface values become `{"type": "<hex tag>", "value": <payload>}`.
//!   Decoding demands exactly those two keys.
//! - Maps are supported, keys sorted. A nil map encodes as `{}`, and `{}`
//!   decodes to an empty map, never to nil.
//! - Bytes are lowercase hex strings; timestamps are RFC 3339 in UTC.
//! - Missing keys and `null` in non-pointer positions decode to zero
//!   values. Unknown keys are ignored.
//! - Types with a [`JsonMarshaler`](crate::JsonMarshaler) render
//!   themselves.

mod decode;
mod encode;

pub use decode::JsonDecoder;
pub use encode::JsonEncoder;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value as Json};

use crate::error::{CodecError, CodecResult};
use crate::registry::Tag;

pub(crate) const TYPE_KEY: &str = "type";
pub(crate) const VALUE_KEY: &str = "value";

/// Wrap a payload in the tagged-object form.
pub(crate) fn tagged(tag: &Tag, payload: Json) -> Json {
    let mut obj = Map::with_capacity(2);
    obj.insert(TYPE_KEY.to_owned(), Json::String(tag.to_hex()));
    obj.insert(VALUE_KEY.to_owned(), payload);
    Json::Object(obj)
}

pub(crate) fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Render `tree` with one `indent` per nesting level, starting every line
/// after the first with `prefix`.
pub fn to_indented_string(tree: &Json, prefix: &str, indent: &str) -> CodecResult<String> {
    let mut out = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(indent.as_bytes()));
    tree.serialize(&mut ser)?;
    let text = String::from_utf8(out).map_err(|e| CodecError::Malformed(e.to_string()))?;
    if prefix.is_empty() {
        return Ok(text);
    }
    // Raw newlines only occur between tokens; strings escape theirs.
    Ok(text.replace('\n', &format!("\n{prefix}")))
}
