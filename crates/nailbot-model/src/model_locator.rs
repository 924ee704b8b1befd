//! Model locator for runtime path resolution.
//!
//! Models are disk assets installed next to the retrieval index, never
//! downloaded at runtime.
//!
//! # Search Order
//!
//! 1. **Environment override**: `$NAILBOT_MODELS_DIR`
//! 2. **User directory**: `~/.nailbot/models`
//! 3. **Binary-relative**: `{exe_dir}/models`
//!
//! # Model Layout
//!
//! ```text
//! {models_dir}/
//!   embeddings/
//!     all-MiniLM-L6-v2/
//!       config.json
//!       model.safetensors
//!       tokenizer.json
//! ```
//!
//! A HuggingFace-style `{models_dir}/sentence-transformers/all-MiniLM-L6-v2`
//! or a flat `{models_dir}/all-MiniLM-L6-v2` layout is accepted as well.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{ModelError, ModelResult};

/// Environment variable for overriding the models directory.
pub const MODELS_DIR_ENV: &str = "NAILBOT_MODELS_DIR";

pub const EMBEDDINGS_SUBDIR: &str = "embeddings";

/// Default embedding model name (short form).
pub const DEFAULT_EMBEDDING_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Required files for a valid model directory.
pub const REQUIRED_MODEL_FILES: &[&str] = &["config.json", "model.safetensors", "tokenizer.json"];

// ============================================================================
// ModelLocator
// ============================================================================

/// Locates model files at runtime using a defined search order.
#[derive(Debug, Clone, Default)]
pub struct ModelLocator {
    base_dir: Option<PathBuf>,
}

impl ModelLocator {
    pub fn new() -> Self {
        Self { base_dir: None }
    }

    /// Create a model locator pinned to one base directory.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    /// Resolve the base models directory: the first search location that
    /// exists as a directory.
    pub fn resolve_base_dir(&self) -> ModelResult<PathBuf> {
        if let Some(ref base) = self.base_dir {
            if base.is_dir() {
                return Ok(base.clone());
            }
            return Err(ModelError::ModelsDirectoryNotFound {
                searched: vec![base.clone()],
            });
        }

        let mut searched = Vec::new();
        for candidate in Self::search_locations() {
            if candidate.is_dir() {
                return Ok(candidate);
            }
            searched.push(candidate);
        }

        Err(ModelError::ModelsDirectoryNotFound { searched })
    }

    fn search_locations() -> Vec<PathBuf> {
        let mut locations = Vec::with_capacity(3);
        if let Ok(env_path) = env::var(MODELS_DIR_ENV) {
            locations.push(PathBuf::from(env_path));
        }
        if let Some(home) = dirs::home_dir() {
            locations.push(home.join(".nailbot").join("models"));
        }
        if let Some(exe_dir) = env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
        {
            locations.push(exe_dir.join("models"));
        }
        locations
    }

    /// Resolve the directory of an embedding model given its full HuggingFace
    /// id or its short name.
    pub fn embedding_model_path(&self, model_id: &str) -> ModelResult<PathBuf> {
        let base = self.resolve_base_dir()?;
        let model_name = extract_model_name(model_id);

        let candidates = [
            base.join(EMBEDDINGS_SUBDIR).join(model_name),
            base.join(model_id),
            base.join(model_name),
        ];

        candidates
            .iter()
            .find(|path| is_valid_model_dir(path))
            .cloned()
            .ok_or_else(|| ModelError::ModelNotFound {
                model_id: model_id.to_string(),
                path: candidates[0].clone(),
            })
    }

    pub fn default_embedding_model_path(&self) -> ModelResult<PathBuf> {
        self.embedding_model_path(DEFAULT_EMBEDDING_MODEL_NAME)
    }

    pub fn has_default_embedding_model(&self) -> bool {
        self.default_embedding_model_path().is_ok()
    }

    /// Validate that a model directory contains all required files.
    pub fn validate_model_dir(&self, path: &Path) -> ModelResult<()> {
        if !path.exists() {
            return Err(ModelError::ModelNotFound {
                model_id: path.display().to_string(),
                path: path.to_path_buf(),
            });
        }

        let missing: Vec<&'static str> = REQUIRED_MODEL_FILES
            .iter()
            .copied()
            .filter(|file| !path.join(file).exists())
            .collect();

        if !missing.is_empty() {
            return Err(ModelError::IncompleteModelFiles {
                path: path.to_path_buf(),
                missing,
            });
        }

        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// "sentence-transformers/all-MiniLM-L6-v2" → "all-MiniLM-L6-v2"
pub(crate) fn extract_model_name(model_id: &str) -> &str {
    model_id.rsplit('/').next().unwrap_or(model_id)
}

fn is_valid_model_dir(path: &Path) -> bool {
    path.is_dir() && path.join("config.json").exists()
}

/// Get a default model locator.
pub fn default_locator() -> ModelLocator {
    ModelLocator::new()
}
