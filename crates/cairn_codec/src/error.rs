//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while converting or encoding payload values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// NaN and infinities have no canonical form.
    #[error("non-finite float values cannot be encoded")]
    NonFiniteFloat,

    /// A JSON number does not fit the value model.
    #[error("integer overflow: {literal}")]
    IntegerOverflow {
        /// The number as it appeared in the source document.
        literal: String,
    },

    /// JSON has no representation for this value.
    #[error("unsupported value: {type_name}")]
    UnsupportedType {
        /// Name of the unsupported kind.
        type_name: String,
    },

    /// Failed to parse a JSON document.
    #[error("invalid json: {message}")]
    InvalidJson {
        /// Parser message.
        message: String,
    },
}

impl CodecError {
    /// Create an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    /// Create an integer overflow error.
    pub fn integer_overflow(literal: impl Into<String>) -> Self {
        Self::IntegerOverflow {
            literal: literal.into(),
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson {
            message: err.to_string(),
        }
    }
}
