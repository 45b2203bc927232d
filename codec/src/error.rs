//! # Codec Errors
//!
//! One error type for the whole crate. Every variant belongs to exactly one
//! [`ErrorClass`], which is what callers should branch on:
//!
//! | Class           | Raised by            | What to do                      |
//! |-----------------|----------------------|---------------------------------|
//! | `Configuration` | registration         | fail startup                    |
//! | `Unregistered`  | encode/decode        | report, the input named a type we do not know |
//! | `Malformed`     | decode               | report, the input is bad        |
//! | `Unsupported`   | encode/decode        | fix the calling code            |
//!
//! A destination that is not a mutable reference is not an error here: the
//! decode API only accepts `&mut T` or returns `T`.

use std::fmt;

/// Coarse classification of a [`CodecError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Bad registration or config. Detected before any data flows.
    Configuration,
    /// A tag or type with no registry entry.
    Unregistered,
    /// Truncated, corrupt, or structurally wrong input.
    Malformed,
    /// A shape the engine refuses to handle. Always a usage bug.
    Unsupported,
}

impl ErrorClass {
    /// Programmer errors should abort loudly; everything else is the
    /// input's fault and should be reported.
    pub fn is_programmer_error(&self) -> bool {
        matches!(self, ErrorClass::Configuration | ErrorClass::Unsupported)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClass::Configuration => "configuration",
            ErrorClass::Unregistered => "unregistered",
            ErrorClass::Malformed => "malformed",
            ErrorClass::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// Errors produced by registration, encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    // -- Configuration ------------------------------------------------------
    #[error("wire name {name:?} is already registered")]
    DuplicateName { name: String },

    #[error("tag {tag} of {name:?} collides with {existing:?}")]
    DuplicateTag {
        name: String,
        existing: String,
        tag: String,
    },

    #[error("type {type_name} is already registered")]
    DuplicateType { type_name: &'static str },

    #[error("interface {contract} is already registered")]
    DuplicateContract { contract: &'static str },

    #[error("{concrete} is already an implementation of {contract}")]
    DuplicateImplementation {
        contract: &'static str,
        concrete: &'static str,
    },

    #[error("interface {contract} is not registered")]
    UnknownContract { contract: &'static str },

    #[error("type {type_name} is not registered as a concrete type")]
    UnknownConcrete { type_name: &'static str },

    #[error("invalid codec config: {0}")]
    InvalidConfig(String),

    // -- Unregistered -------------------------------------------------------
    #[error("type {type_name} is not registered")]
    UnregisteredType { type_name: &'static str },

    #[error("no type registered for tag {tag}")]
    UnregisteredTag { tag: String },

    #[error("{concrete} is not registered as an implementation of {contract}")]
    NotImplemented {
        contract: &'static str,
        concrete: &'static str,
    },

    // -- Malformed ----------------------------------------------------------
    #[error("expected a value tagged as {expected}, found tag {found}")]
    TagMismatch { expected: &'static str, found: String },

    #[error("unexpected end of input: {needed} more bytes needed")]
    Truncated { needed: usize },

    #[error("{0} trailing bytes after the encoded value")]
    TrailingBytes(usize),

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: String,
    },

    #[error("list of {len} elements exceeds the limit of {max}")]
    ListTooLong { len: u64, max: usize },

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("custom JSON marshaler failed: {0}")]
    Custom(String),

    // -- Unsupported --------------------------------------------------------
    #[error("unsupported shape: {0}")]
    Unsupported(String),

    #[error("exceeded maximum nesting depth of {0}")]
    DepthExceeded(usize),
}

/// Convenience alias used throughout the crate.
pub type CodecResult<T> = Result<T, CodecError>;

impl CodecError {
    /// Which bucket this error falls into.
    pub fn class(&self) -> ErrorClass {
        match self {
            CodecError::DuplicateName { .. }
            | CodecError::DuplicateTag { .. }
            | CodecError::DuplicateType { .. }
            | CodecError::DuplicateContract { .. }
            | CodecError::DuplicateImplementation { .. }
            | CodecError::UnknownContract { .. }
            | CodecError::UnknownConcrete { .. }
            | CodecError::InvalidConfig(_) => ErrorClass::Configuration,

            CodecError::UnregisteredType { .. }
            | CodecError::UnregisteredTag { .. }
            | CodecError::NotImplemented { .. } => ErrorClass::Unregistered,

            CodecError::TagMismatch { .. }
            | CodecError::Truncated { .. }
            | CodecError::TrailingBytes(_)
            | CodecError::Malformed(_)
            | CodecError::Mismatch { .. }
            | CodecError::ListTooLong { .. }
            | CodecError::InvalidJson(_)
            | CodecError::Custom(_) => ErrorClass::Malformed,

            CodecError::Unsupported(_) | CodecError::DepthExceeded(_) => ErrorClass::Unsupported,
        }
    }

    /// Shorthand for `self.class().is_programmer_error()`.
    pub fn is_programmer_error(&self) -> bool {
        self.class().is_programmer_error()
    }

    /// Wrap an error from a user-supplied [`JsonMarshaler`](crate::JsonMarshaler).
    pub fn custom(msg: impl fmt::Display) -> Self {
        CodecError::Custom(msg.to_string())
    }

    pub(crate) fn mismatch(expected: &'static str, found: impl fmt::Display) -> Self {
        CodecError::Mismatch {
            expected,
            found: found.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_split_programmer_errors_from_bad_input() {
        let dup = CodecError::DuplicateName { name: "car".into() };
        assert_eq!(dup.class(), ErrorClass::Configuration);
        assert!(dup.is_programmer_error());

        let unsupported = CodecError::Unsupported("map in binary".into());
        assert!(unsupported.is_programmer_error());

        let truncated = CodecError::Truncated { needed: 4 };
        assert_eq!(truncated.class(), ErrorClass::Malformed);
        assert!(!truncated.is_programmer_error());

        let unknown = CodecError::UnregisteredTag { tag: "deadbeef".into() };
        assert_eq!(unknown.class(), ErrorClass::Unregistered);
        assert!(!unknown.is_programmer_error());
    }

    #[test]
    fn json_errors_convert() {
        let err: CodecError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.class(), ErrorClass::Malformed);
    }

    #[test]
    fn messages_are_readable() {
        let err = CodecError::DepthExceeded(64);
        assert_eq!(err.to_string(), "exceeded maximum nesting depth of 64");
        assert_eq!(ErrorClass::Unregistered.to_string(), "unregistered");
    }
}
