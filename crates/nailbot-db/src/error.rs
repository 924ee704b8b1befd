//! Error types for nailbot-db.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for nailbot-db operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in nailbot-db operations.
#[derive(Debug, Error)]
pub enum DbError {
    // ========================================================================
    // Collection errors
    // ========================================================================
    #[error("Collection I/O error at {path}: {message}")]
    VectorIo { path: PathBuf, message: String },

    #[error("Collection parse error at {path}: {message}")]
    VectorParse { path: PathBuf, message: String },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The collection directory does not exist and creation was not requested.
    #[error("Collection '{collection}' not found at {path}. Run the index builder first.")]
    IndexNotFound { collection: String, path: PathBuf },

    #[error("Collection '{collection}' is incompatible: {reason}")]
    IndexIncompatible { collection: String, reason: String },

    #[error("Vector backend '{backend}' is not available: {reason}")]
    BackendNotAvailable { backend: String, reason: String },

    #[cfg(feature = "lancedb")]
    #[error("LanceDB error: {message}")]
    LanceDb { message: String },

    // ========================================================================
    // General errors
    // ========================================================================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    pub fn vector_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::VectorIo {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn vector_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::VectorParse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn index_incompatible(collection: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IndexIncompatible {
            collection: collection.into(),
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the error means the collection has not been built yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::IndexNotFound { .. })
    }
}

#[cfg(feature = "lancedb")]
impl From<lancedb::Error> for DbError {
    fn from(err: lancedb::Error) -> Self {
        Self::LanceDb {
            message: err.to_string(),
        }
    }
}
