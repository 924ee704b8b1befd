//! Adapter layer for nailbot-model.
//!
//! - Error conversion from `ModelError` to `RagError`
//! - [`ModelEmbeddingBackend`], which implements the core
//!   [`EmbeddingBackend`] trait over `nailbot_model::EmbeddingModel`

use crate::embedding::EmbeddingBackend;
use crate::errors::{RagError, RagResult};

// ============================================================================
// Error Conversion
// ============================================================================

/// Convert a nailbot-model error to a core error.
///
/// Discovery and loading failures become [`RagError::EmbedderUnavailable`]
/// (configuration absence); inference failures become
/// [`RagError::Embedding`].
pub fn from_model_error(err: nailbot_model::ModelError) -> RagError {
    use nailbot_model::ModelError;

    match err {
        ModelError::ModelsDirectoryNotFound { .. }
        | ModelError::ModelNotFound { .. }
        | ModelError::IncompleteModelFiles { .. }
        | ModelError::ModelLoad { .. }
        | ModelError::InvalidConfig { .. }
        | ModelError::ProviderNotAvailable { .. }
        | ModelError::DeviceNotAvailable { .. } => RagError::EmbedderUnavailable(err.to_string()),

        ModelError::Tokenization { .. } | ModelError::EmbeddingFailed { .. } => {
            RagError::Embedding(err.to_string())
        }

        ModelError::Io(io_err) => RagError::Io(io_err),
        ModelError::Json(json_err) => RagError::Json(json_err),
    }
}

/// Extension trait for converting model results.
pub trait IntoRagResult<T> {
    fn into_rag_result(self) -> RagResult<T>;
}

impl<T> IntoRagResult<T> for nailbot_model::ModelResult<T> {
    fn into_rag_result(self) -> RagResult<T> {
        self.map_err(from_model_error)
    }
}

// ============================================================================
// Embedding Backend Wrapper
// ============================================================================

/// Core embedding backend over a `nailbot-model` embedding model.
pub struct ModelEmbeddingBackend {
    inner: Box<dyn nailbot_model::EmbeddingModel>,
}

impl std::fmt::Debug for ModelEmbeddingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEmbeddingBackend")
            .field("model_id", &self.inner.model_id())
            .field("dimension", &self.inner.dimension())
            .finish()
    }
}

impl ModelEmbeddingBackend {
    pub fn new(model: Box<dyn nailbot_model::EmbeddingModel>) -> Self {
        Self { inner: model }
    }

    /// Locate and load the configured model.
    pub fn from_config(config: &nailbot_model::EmbeddingConfig) -> RagResult<Self> {
        let model = nailbot_model::create_embedding_model(config).into_rag_result()?;
        Ok(Self::new(model))
    }

    pub fn warm_up(&self) -> RagResult<()> {
        self.inner.warm_up().into_rag_result()
    }
}

impl EmbeddingBackend for ModelEmbeddingBackend {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embed(&self, texts: &[&str]) -> RagResult<Vec<Vec<f32>>> {
        self.inner.embed(texts).into_rag_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nailbot_model::ModelError;
    use std::path::PathBuf;

    #[test]
    fn test_missing_model_is_unavailable() {
        let err = from_model_error(ModelError::ModelNotFound {
            model_id: "sentence-transformers/all-MiniLM-L6-v2".into(),
            path: PathBuf::from("/nowhere/all-MiniLM-L6-v2"),
        });
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("all-MiniLM-L6-v2"));
    }

    #[test]
    fn test_inference_failure_is_not_unavailable() {
        let err = from_model_error(ModelError::embedding_failed("m", "tensor shape"));
        assert!(matches!(err, RagError::Embedding(_)));
    }

    #[test]
    fn test_from_config_with_missing_path() {
        let config = nailbot_model::EmbeddingConfig::default()
            .with_local_path("/definitely/not/a/model/dir");
        let err = ModelEmbeddingBackend::from_config(&config).unwrap_err();
        assert!(err.is_unavailable(), "unexpected error: {err}");
    }
}
