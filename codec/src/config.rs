//! # Codec Configuration
//!
//! Every tunable knob of the codec lives here, along with the constants that
//! define the wire layout. Changing a constant in this file changes the wire
//! format, so treat them like a protocol version bump.
//!
//! ## Tag layout
//!
//! A disambiguation tag is `disfix ‖ prefix`, carved out of the SHA-256
//! digest of the wire name. The defaults (3 + 4 bytes) give the 7-byte tags
//! that the JSON form renders as 14 lowercase hex characters.
//!
//! ```text
//! sha256("car") = 2b 29 61 a4 31 b2 3b ...
//!                 └─disfix─┘ └──prefix──┘  (last prefix byte & 0xF8)
//! tag           = 2b2961a431b238
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

// ---------------------------------------------------------------------------
// Wire Layout Constants
// ---------------------------------------------------------------------------

/// Number of disambiguation bytes at the front of a tag.
pub const DEFAULT_DISFIX_LEN: usize = 3;

/// Number of prefix bytes following the disambiguation bytes.
pub const DEFAULT_PREFIX_LEN: usize = 4;

/// Mask applied to the last prefix byte. The low three bits are reserved.
pub const PREFIX_RESERVED_MASK: u8 = 0xF8;

/// Upper bound on `disfix_len + prefix_len`. A tag length has to fit in the
/// single length byte the binary engine writes, and has to be carved out of
/// a 32-byte digest after skipping zero bytes.
pub const MAX_TAG_LEN: usize = 16;

/// Maximum number of bytes a `u64` varint can occupy.
pub const MAX_VARINT_LEN: usize = 10;

// ---------------------------------------------------------------------------
// Resource Limits
// ---------------------------------------------------------------------------

/// Default nesting limit for encode and decode.
///
/// Counts composite levels (structs, lists, maps, interface payloads), not
/// pointer levels. Deep enough for any sane document, shallow enough that a
/// hostile input cannot blow the stack.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Hard ceiling for `max_depth`. Above this, the recursion itself becomes
/// the problem.
pub const MAX_DEPTH_CEILING: usize = 1024;

/// Default cap on binary list lengths.
///
/// Elements that encode to zero bytes (field-less structs) cannot be bounded
/// by the remaining input, so the element count itself is capped.
pub const DEFAULT_MAX_LIST_LEN: usize = 1 << 20;

// ---------------------------------------------------------------------------
// TagLayout
// ---------------------------------------------------------------------------

/// How many bytes of the digest go into each half of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagLayout {
    /// Disambiguation bytes. Zero is allowed; then the tag is all prefix.
    pub disfix_len: usize,

    /// Prefix bytes. The short binary tag form carries only these.
    pub prefix_len: usize,
}

impl TagLayout {
    pub const fn new(disfix_len: usize, prefix_len: usize) -> Self {
        Self {
            disfix_len,
            prefix_len,
        }
    }

    /// Length of the full (disambiguated) tag.
    pub const fn full_len(&self) -> usize {
        self.disfix_len + self.prefix_len
    }
}

impl Default for TagLayout {
    fn default() -> Self {
        Self::new(DEFAULT_DISFIX_LEN, DEFAULT_PREFIX_LEN)
    }
}

// ---------------------------------------------------------------------------
// CodecConfig
// ---------------------------------------------------------------------------

/// Construction-time parameters for a [`Codec`](crate::Codec).
///
/// Deserializable so it can be embedded in a host application's own config
/// file. Missing keys fall back to [`CodecConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Maximum composite nesting depth, checked in both engines and both
    /// directions.
    pub max_depth: usize,

    /// Floating point values have no canonical encoding. They are rejected
    /// as unsupported unless this is set.
    pub allow_floats: bool,

    /// Longest list the binary engine will write or read.
    pub max_list_len: usize,

    /// Tag layout used for every registration on this codec.
    pub tag_layout: TagLayout,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            allow_floats: false,
            max_list_len: DEFAULT_MAX_LIST_LEN,
            tag_layout: TagLayout::default(),
        }
    }
}

impl CodecConfig {
    /// Check the config for values the engines cannot work with.
    pub fn validate(&self) -> CodecResult<()> {
        if self.max_depth == 0 {
            return Err(CodecError::InvalidConfig(
                "max_depth must be at least 1".into(),
            ));
        }
        if self.max_depth > MAX_DEPTH_CEILING {
            return Err(CodecError::InvalidConfig(format!(
                "max_depth {} exceeds the ceiling of {MAX_DEPTH_CEILING}",
                self.max_depth
            )));
        }
        if self.max_list_len == 0 {
            return Err(CodecError::InvalidConfig(
                "max_list_len must be at least 1".into(),
            ));
        }
        if self.tag_layout.prefix_len == 0 {
            return Err(CodecError::InvalidConfig(
                "tag prefix must be at least one byte".into(),
            ));
        }
        if self.tag_layout.full_len() > MAX_TAG_LEN {
            return Err(CodecError::InvalidConfig(format!(
                "tag length {} exceeds {MAX_TAG_LEN} bytes",
                self.tag_layout.full_len()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        CodecConfig::default().validate().unwrap();
    }

    #[test]
    fn default_tag_is_seven_bytes() {
        assert_eq!(TagLayout::default().full_len(), 7);
    }

    #[test]
    fn reserved_mask_clears_three_bits() {
        assert_eq!(PREFIX_RESERVED_MASK.count_zeros(), 3);
        assert_eq!(0xFF & PREFIX_RESERVED_MASK, 0xF8);
    }

    #[test]
    fn rejects_zero_depth() {
        let config = CodecConfig {
            max_depth: 0,
            ..CodecConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CodecError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_zero_list_len() {
        let config = CodecConfig {
            max_list_len: 0,
            ..CodecConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CodecError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_empty_prefix() {
        let config = CodecConfig {
            tag_layout: TagLayout::new(3, 0),
            ..CodecConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_oversized_tags() {
        let config = CodecConfig {
            tag_layout: TagLayout::new(10, 10),
            ..CodecConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_config_uses_defaults() {
        let config: CodecConfig = serde_json::from_str(r#"{"allow_floats": true}"#).unwrap();
        assert!(config.allow_floats);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.tag_layout, TagLayout::default());
    }
}
