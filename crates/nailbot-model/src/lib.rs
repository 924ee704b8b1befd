//! # nailbot-model
//!
//! ML inference layer for nailbot: sentence embeddings used to query the
//! Local and Scholar passage collections.
//!
//! - **Embedding models**: bi-encoder models producing L2-normalized vectors
//! - **Model locator**: runtime path resolution for disk-based models
//! - **Config**: the embedding configuration shared with `nailbot-core`
//!
//! Test doubles live in consuming crates; this crate only ships the
//! production Candle backend.
//!
//! ## Model Location
//!
//! Models are searched in this order:
//! 1. `$NAILBOT_MODELS_DIR` environment variable
//! 2. `~/.nailbot/models` user directory
//! 3. `{exe_dir}/models` next to the binary
//!
//! ## Features
//!
//! - `embedded` (default): local Candle inference
//! - `metal` / `cuda`: GPU acceleration
//!
//! ## Usage
//!
//! ```ignore
//! use nailbot_model::{create_embedding_model, EmbeddingConfig, EmbeddingModel};
//!
//! let model = create_embedding_model(&EmbeddingConfig::default())?;
//! let vectors = model.embed(&["kuku berlubang kecil"])?;
//! assert_eq!(vectors[0].len(), model.dimension());
//! ```

pub mod config;
pub mod error;
pub mod model_locator;

#[cfg(feature = "embedded")]
mod embedding;

pub use error::{ModelError, ModelResult};

pub use config::{
    DevicePreference, EmbeddingConfig, HuggingFaceModelConfig, ModelArchitecture, ModelInfo,
};

pub use model_locator::{
    default_locator, ModelLocator, DEFAULT_EMBEDDING_MODEL_NAME, EMBEDDINGS_SUBDIR,
    MODELS_DIR_ENV, REQUIRED_MODEL_FILES,
};

/// Default embedding model (full HuggingFace identifier).
pub const DEFAULT_EMBEDDING_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

// ============================================================================
// Embedding Model Trait
// ============================================================================

/// Trait for embedding models (bi-encoders).
///
/// Implementations must be deterministic for identical input and model
/// version, and must return unit-length vectors so that cosine distance in
/// the collections is meaningful.
pub trait EmbeddingModel: Send + Sync + std::fmt::Debug {
    /// Generate embeddings for a batch of texts, one vector per input.
    fn embed(&self, texts: &[&str]) -> ModelResult<Vec<Vec<f32>>>;

    /// Convenience wrapper over [`EmbeddingModel::embed`] for owned strings.
    fn embed_batch(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>> {
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        self.embed(&refs)
    }

    /// Run a dummy inference so the first real query doesn't pay the load cost.
    fn warm_up(&self) -> ModelResult<()> {
        let _ = self.embed(&["kuku"])?;
        Ok(())
    }

    fn dimension(&self) -> usize;

    fn max_sequence_length(&self) -> usize;

    fn model_info(&self) -> &ModelInfo;

    fn model_id(&self) -> &str {
        &self.model_info().model_id
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Create an embedding model from configuration.
///
/// # Errors
///
/// Returns `ModelError` if the model cannot be located or loaded.
#[cfg(feature = "embedded")]
pub fn create_embedding_model(config: &EmbeddingConfig) -> ModelResult<Box<dyn EmbeddingModel>> {
    let model = embedding::CandleEmbeddingModel::new(config)?;
    Ok(Box::new(model))
}

#[cfg(not(feature = "embedded"))]
pub fn create_embedding_model(config: &EmbeddingConfig) -> ModelResult<Box<dyn EmbeddingModel>> {
    Err(ModelError::ProviderNotAvailable {
        provider: config.model_id.clone(),
        reason: "No embedding providers available. Enable the 'embedded' feature.".to_string(),
    })
}

#[cfg(feature = "embedded")]
pub use embedding::CandleEmbeddingModel;
