//! Error types for nailbot-core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for retrieval operations.
pub type RagResult<T> = Result<T, RagError>;

/// Errors surfaced by the retrieval core.
#[derive(Error, Debug)]
pub enum RagError {
    /// The config file exists but could not be read.
    #[error("Failed to read config {path}: {message}")]
    ConfigIo { path: PathBuf, message: String },

    /// The config file is not valid YAML for [`crate::RagConfig`].
    #[error("Config invalid at {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    /// A configuration value is unusable.
    #[error("Invalid configuration: {message}. {hint}")]
    InvalidConfiguration {
        /// What is wrong.
        message: String,
        /// Actionable hint on how to fix it.
        hint: String,
    },

    /// Retrieval parameters that cannot produce a result (e.g. both `k` zero).
    #[error("Invalid retrieval request: {0}")]
    InvalidRequest(String),

    /// The embedding model could not be located or loaded.
    #[error("Embedding model unavailable: {0}")]
    EmbedderUnavailable(String),

    /// The embedding model failed on a specific input.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// A collection could not be opened (missing index, incompatible build, ...).
    #[error("Collection `{collection}` unavailable: {message}")]
    CollectionUnavailable { collection: String, message: String },

    /// A nearest-neighbor query failed on an opened collection.
    #[error("Query on collection `{collection}` failed: {message}")]
    CollectionQuery { collection: String, message: String },

    /// Lenient retrieval still gives up when no variant succeeded.
    #[error("All {count} query variants failed; first error: {first}")]
    AllVariantsFailed { count: usize, first: String },

    /// The text generator returned an error.
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RagError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True for configuration absence: the embedder or a collection could not
    /// be reached at all. Callers use this to fall back to a context-free path.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::EmbedderUnavailable(_) | Self::CollectionUnavailable { .. }
        )
    }
}
