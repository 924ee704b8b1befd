//! Error types for nailbot-model.
//!
//! Discovery errors spell out where models were searched for and how to
//! install them, since a missing model is the most common first-run failure.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for nailbot-model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur in nailbot-model operations.
#[derive(Debug, Error)]
pub enum ModelError {
    // ========================================================================
    // Model discovery errors
    // ========================================================================
    /// No models directory found in any search location.
    #[error("{}", format_models_dir_not_found(.searched))]
    ModelsDirectoryNotFound { searched: Vec<PathBuf> },

    /// Model files not found at expected location.
    #[error("{}", format_model_not_found(.model_id, .path))]
    ModelNotFound { model_id: String, path: PathBuf },

    /// Model directory exists but is missing required files.
    #[error("{}", format_incomplete_model(.path, .missing))]
    IncompleteModelFiles {
        path: PathBuf,
        missing: Vec<&'static str>,
    },

    // ========================================================================
    // Model loading errors
    // ========================================================================
    #[error("Failed to load model '{model_id}': {message}")]
    ModelLoad { model_id: String, message: String },

    #[error("Invalid model configuration: {message}\n\nThe model's config.json may be corrupted or incompatible.\nTry re-downloading the model from Hugging Face.")]
    InvalidConfig { message: String },

    // ========================================================================
    // Inference errors
    // ========================================================================
    #[error("Tokenization failed: {message}")]
    Tokenization { message: String },

    #[error("Embedding failed for model '{model_id}': {message}")]
    EmbeddingFailed { model_id: String, message: String },

    // ========================================================================
    // Provider errors
    // ========================================================================
    #[error("Provider '{provider}' not available: {reason}")]
    ProviderNotAvailable { provider: String, reason: String },

    #[error("Compute device not available: {reason}\n\nSet `embedding.device: cpu` in ~/.nailbot/config.yaml or pass --device cpu.")]
    DeviceNotAvailable { reason: String },

    // ========================================================================
    // I/O errors
    // ========================================================================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error message formatters
// ============================================================================

fn format_models_dir_not_found(searched: &[PathBuf]) -> String {
    let list = searched
        .iter()
        .enumerate()
        .map(|(i, p)| format!("  {}. {}", i + 1, p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Models directory not found.\n\n\
        nailbot searched these locations:\n\
        {list}\n\n\
        To fix:\n\
        1. Set $NAILBOT_MODELS_DIR to your models directory, OR\n\
        2. Copy models to ~/.nailbot/models/, OR\n\
        3. Ensure models/ exists next to the nailbot binary."
    )
}

fn format_model_not_found(model_id: &str, path: &std::path::Path) -> String {
    format!(
        "Model not found: {model_id}\n\n\
        Expected at: {}\n\n\
        The directory must contain config.json, model.safetensors and tokenizer.json\n\
        (for example a snapshot of the model from Hugging Face).",
        path.display()
    )
}

fn format_incomplete_model(path: &std::path::Path, missing: &[&str]) -> String {
    let missing_list = missing.join(", ");
    format!(
        "Incomplete model installation at {}\n\n\
        Missing files: {missing_list}",
        path.display()
    )
}

// ============================================================================
// Error constructors
// ============================================================================

impl ModelError {
    pub fn model_load(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    pub fn embedding_failed(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingFailed {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    pub fn tokenization(message: impl Into<String>) -> Self {
        Self::Tokenization {
            message: message.into(),
        }
    }

    /// Whether the error means the model is simply not installed.
    pub fn is_missing_model(&self) -> bool {
        matches!(
            self,
            Self::ModelsDirectoryNotFound { .. }
                | Self::ModelNotFound { .. }
                | Self::IncompleteModelFiles { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_models_dir_not_found_lists_paths() {
        let err = ModelError::ModelsDirectoryNotFound {
            searched: vec![PathBuf::from("/a/models"), PathBuf::from("/b/models")],
        };
        let msg = err.to_string();
        assert!(msg.contains("1. /a/models"));
        assert!(msg.contains("2. /b/models"));
        assert!(msg.contains("NAILBOT_MODELS_DIR"));
    }

    #[test]
    fn test_is_missing_model() {
        let missing = ModelError::ModelNotFound {
            model_id: "x".into(),
            path: PathBuf::from("/x"),
        };
        assert!(missing.is_missing_model());
        assert!(!ModelError::tokenization("bad input").is_missing_model());
    }
}
