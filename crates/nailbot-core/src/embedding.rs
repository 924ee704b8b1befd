//! Query embedding abstraction.
//!
//! The production backend is [`crate::model_adapter::ModelEmbeddingBackend`],
//! a wrapper around the Candle model from `nailbot-model`. There is no silent
//! fallback to a fake embedder at runtime: a missing model surfaces as
//! [`RagError::EmbedderUnavailable`] so the caller can degrade explicitly.

use crate::errors::{RagError, RagResult};

/// Turns text into L2-normalized vectors.
///
/// Implementations must be deterministic for identical input and model
/// version, and must produce vectors in the same space as the one the
/// collections were built with.
pub trait EmbeddingBackend: Send + Sync {
    /// Model identifier, e.g. `sentence-transformers/all-MiniLM-L6-v2`.
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Embed a batch of texts, one vector per input.
    fn embed(&self, texts: &[&str]) -> RagResult<Vec<Vec<f32>>>;

    /// Embed a single text.
    fn embed_one(&self, text: &str) -> RagResult<Vec<f32>> {
        self.embed(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("embedder returned no vector".to_string()))
    }
}
