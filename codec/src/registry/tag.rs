//! # Disambiguation Tags
//!
//! A tag is a fingerprint of a wire name, carved from its SHA-256 digest:
//!
//! 1. Drop leading `0x00` bytes of the digest.
//! 2. Take `disfix_len` bytes.
//! 3. Drop `0x00` bytes again.
//! 4. Take `prefix_len` bytes and clear the low three bits of the last one.
//!
//! The result is `disfix ‖ prefix`. Tags are content-addressed, so the same
//! name yields the same tag in every process regardless of registration
//! order. The binary engine may send just the prefix when it is unambiguous;
//! JSON always carries the full tag in lowercase hex.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::config::{TagLayout, PREFIX_RESERVED_MASK};
use crate::error::{CodecError, CodecResult};

/// A derived disambiguation tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    bytes: Vec<u8>,
    prefix_at: usize,
}

impl Tag {
    /// Derive the tag of `name` under `layout`.
    pub fn derive(name: &str, layout: TagLayout) -> CodecResult<Self> {
        let digest = Sha256::digest(name.as_bytes());
        let mut rest = digest.iter().copied();

        let disfix: Vec<u8> = rest
            .by_ref()
            .skip_while(|b| *b == 0)
            .take(layout.disfix_len)
            .collect();
        let mut prefix: Vec<u8> = rest
            .skip_while(|b| *b == 0)
            .take(layout.prefix_len)
            .collect();

        if disfix.len() != layout.disfix_len || prefix.len() != layout.prefix_len {
            return Err(CodecError::InvalidConfig(format!(
                "digest of {name:?} is too short for a {}-byte tag",
                layout.full_len()
            )));
        }
        if let Some(last) = prefix.last_mut() {
            *last &= PREFIX_RESERVED_MASK;
        }

        let prefix_at = disfix.len();
        let mut bytes = disfix;
        bytes.append(&mut prefix);
        Ok(Self { bytes, prefix_at })
    }

    /// Rebuild a full tag from raw bytes read off the wire.
    pub fn from_bytes(bytes: &[u8], layout: TagLayout) -> CodecResult<Self> {
        if bytes.len() != layout.full_len() {
            return Err(CodecError::Malformed(format!(
                "tag is {} bytes, expected {}",
                bytes.len(),
                layout.full_len()
            )));
        }
        Ok(Self {
            bytes: bytes.to_vec(),
            prefix_at: layout.disfix_len,
        })
    }

    /// Parse the hex form used by the JSON engine. Either case is accepted.
    pub fn parse_hex(text: &str, layout: TagLayout) -> CodecResult<Self> {
        let bytes = hex::decode(text)
            .map_err(|e| CodecError::Malformed(format!("tag {text:?} is not hex: {e}")))?;
        Self::from_bytes(&bytes, layout)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn disfix(&self) -> &[u8] {
        &self.bytes[..self.prefix_at]
    }

    /// The short form the binary engine sends when it is unambiguous.
    pub fn prefix(&self) -> &[u8] {
        &self.bytes[self.prefix_at..]
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercase hex of the full tag.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
