//! Error types for the reconciliation engine.

use cairn_codec::{CodecError, Value};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Store code for an invalid write, including a title collision.
pub const CODE_INVALID_DATA: u32 = 119;

/// Store code for a write that collides with an existing locale version.
pub const CODE_ALREADY_EXISTS: u32 = 201;

const NOT_UNIQUE: &str = "is not unique.";
const NULL_DATA: &str = "Cannot read properties of null (reading 'data')";

/// Known classes of write conflicts reported by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// Another item already uses the title.
    TitleNotUnique,
    /// The item (or locale version) already exists.
    AlreadyExists,
    /// The store failed to read its own state; succeeds on a second write.
    NullReference,
}

impl ConflictKind {
    /// The store-specific code for this class.
    pub fn code(self) -> u32 {
        match self {
            ConflictKind::TitleNotUnique | ConflictKind::NullReference => CODE_INVALID_DATA,
            ConflictKind::AlreadyExists => CODE_ALREADY_EXISTS,
        }
    }

    /// Classifies a store error from its code and `details` object.
    ///
    /// Returns `None` for anything that is not a known conflict.
    pub fn classify(code: u32, details: &Value) -> Option<Self> {
        match code {
            CODE_ALREADY_EXISTS => Some(ConflictKind::AlreadyExists),
            CODE_INVALID_DATA => {
                let fields = details.as_map()?;
                let is_only = |msg: &str, v: &Value| {
                    v.as_array()
                        .is_some_and(|a| a.len() == 1 && a[0].as_text() == Some(msg))
                };

                if fields.len() == 1 && details.get("title").is_some_and(|v| is_only(NOT_UNIQUE, v)) {
                    Some(ConflictKind::TitleNotUnique)
                } else if !fields.is_empty() && fields.iter().all(|(_, v)| is_only(NULL_DATA, v)) {
                    Some(ConflictKind::NullReference)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// The `details` object the store sends with this class.
    pub fn details(self) -> Value {
        match self {
            ConflictKind::TitleNotUnique => {
                Value::object([("title", Value::from(vec![NOT_UNIQUE]))])
            }
            ConflictKind::NullReference => {
                Value::object([("entry", Value::from(vec![NULL_DATA]))])
            }
            ConflictKind::AlreadyExists => Value::object(Vec::<(String, Value)>::new()),
        }
    }
}

/// Errors that can occur during reconciliation.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote store rejected a write because of a known conflict class.
    #[error("conflict ({code}): {message}")]
    Conflict {
        /// Conflict class.
        kind: ConflictKind,
        /// Store-specific error code.
        code: u32,
        /// Error message.
        message: String,
    },

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The local snapshot does not have the expected shape.
    #[error("invalid item: {0}")]
    Validation(String),

    /// An item the engine expected to exist remotely is missing.
    #[error("{category} item not found: {key}")]
    NotFound {
        /// Category name.
        category: String,
        /// Logical key.
        key: String,
    },

    /// A failure while processing one item.
    #[error("{category} {key}: {source}")]
    Item {
        /// Category name.
        category: String,
        /// Logical key being processed when the failure happened.
        key: String,
        /// The underlying failure.
        #[source]
        source: Box<SyncError>,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Payload conversion or encoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl SyncError {
    /// Creates a conflict error of the given class.
    pub fn conflict(kind: ConflictKind, message: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            code: kind.code(),
            message: message.into(),
        }
    }

    /// Maps a raw store error into a conflict when it is one, or a fatal
    /// transport error otherwise.
    pub fn from_store(code: u32, message: impl Into<String>, details: &Value) -> Self {
        match ConflictKind::classify(code, details) {
            Some(kind) => Self::conflict(kind, message),
            None => Self::transport_fatal(format!("{} ({code})", message.into())),
        }
    }

    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Wraps this error with the item being processed.
    pub fn for_item(self, category: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Item {
            category: category.into(),
            key: key.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through item context.
    pub fn root(&self) -> &SyncError {
        match self {
            SyncError::Item { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns true if this error can be retried by the transport.
    pub fn is_retryable(&self) -> bool {
        match self.root() {
            SyncError::Transport { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// The conflict class, if this is a conflict.
    pub fn conflict_kind(&self) -> Option<ConflictKind> {
        match self.root() {
            SyncError::Conflict { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns true for any known conflict class.
    pub fn is_conflict(&self) -> bool {
        self.conflict_kind().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("bad credentials").is_retryable());
        assert!(!SyncError::validation("missing title").is_retryable());
        assert!(SyncError::transport_retryable("timeout")
            .for_item("entries", "Home")
            .is_retryable());
    }

    #[test]
    fn classify_store_codes() {
        let taken = ConflictKind::TitleNotUnique.details();
        let null = ConflictKind::NullReference.details();
        let other = Value::object([("url", Value::from(vec!["is invalid."]))]);

        assert_eq!(ConflictKind::classify(119, &taken), Some(ConflictKind::TitleNotUnique));
        assert_eq!(ConflictKind::classify(119, &null), Some(ConflictKind::NullReference));
        assert_eq!(ConflictKind::classify(119, &other), None);
        assert_eq!(ConflictKind::classify(201, &Value::Null), Some(ConflictKind::AlreadyExists));
        assert_eq!(ConflictKind::classify(500, &taken), None);
    }

    #[test]
    fn from_store() {
        let err = SyncError::from_store(119, "Entry import failed", &ConflictKind::TitleNotUnique.details());
        assert_eq!(err.conflict_kind(), Some(ConflictKind::TitleNotUnique));

        let err = SyncError::from_store(422, "Unprocessable", &Value::Null);
        assert!(!err.is_conflict());
        assert!(err.to_string().contains("422"));
    }

    #[test]
    fn item_context() {
        let err = SyncError::conflict(ConflictKind::AlreadyExists, "exists").for_item("entries", "Home");
        assert_eq!(err.to_string(), "entries Home: conflict (201): exists");
        assert_eq!(err.conflict_kind(), Some(ConflictKind::AlreadyExists));
        assert!(std::error::Error::source(&err).is_some());
    }
}
