//! Configuration types for nailbot-model.
//!
//! [`EmbeddingConfig`] is embedded as-is in the `embedding` section of the
//! nailbot YAML config, so field names follow the camelCase convention used
//! there.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::model_locator::{extract_model_name, ModelLocator};
use crate::DEFAULT_EMBEDDING_MODEL_ID;

// ============================================================================
// DevicePreference
// ============================================================================

/// Preference for compute device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// GPU if the binary was built with GPU support and one is present, else CPU.
    #[default]
    Auto,
    Gpu,
    Cpu,
}

impl std::fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Gpu => write!(f, "gpu"),
            Self::Cpu => write!(f, "cpu"),
        }
    }
}

impl std::str::FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "gpu" | "metal" | "cuda" => Ok(Self::Gpu),
            "cpu" => Ok(Self::Cpu),
            _ => Err(format!(
                "Unknown device: '{}'. Use 'auto', 'gpu', or 'cpu'.",
                s
            )),
        }
    }
}

// ============================================================================
// ModelArchitecture
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelArchitecture {
    #[default]
    Bert,
    Roberta,
    Mpnet,
    Unknown,
}

impl std::fmt::Display for ModelArchitecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bert => write!(f, "bert"),
            Self::Roberta => write!(f, "roberta"),
            Self::Mpnet => write!(f, "mpnet"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// ModelInfo
// ============================================================================

/// Information about a loaded model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_id: String,
    pub dimension: usize,
    pub max_seq_len: usize,
    #[serde(default)]
    pub architecture: ModelArchitecture,
}

impl ModelInfo {
    pub fn new(model_id: impl Into<String>, dimension: usize, max_seq_len: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimension,
            max_seq_len,
            architecture: ModelArchitecture::default(),
        }
    }

    pub fn with_architecture(mut self, arch: ModelArchitecture) -> Self {
        self.architecture = arch;
        self
    }
}

// ============================================================================
// EmbeddingConfig
// ============================================================================

/// Configuration for the sentence embedding model.
///
/// The model must match the one used by the offline index builder, otherwise
/// query vectors and stored vectors live in different spaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    /// Model ID (e.g., "sentence-transformers/all-MiniLM-L6-v2").
    #[serde(default = "default_embedding_model_id")]
    pub model_id: String,

    #[serde(default)]
    pub device: DevicePreference,

    /// Explicit model directory. When unset the [`ModelLocator`] search
    /// order applies.
    #[serde(default)]
    pub local_path: Option<PathBuf>,

    #[serde(default = "default_max_seq_len")]
    pub max_sequence_length: usize,

    /// Number of texts per forward pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_model_id() -> String {
    DEFAULT_EMBEDDING_MODEL_ID.to_string()
}

fn default_max_seq_len() -> usize {
    256
}

fn default_batch_size() -> usize {
    32
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: default_embedding_model_id(),
            device: DevicePreference::default(),
            local_path: None,
            max_sequence_length: default_max_seq_len(),
            batch_size: default_batch_size(),
        }
    }
}

impl EmbeddingConfig {
    /// Resolve the effective model path.
    ///
    /// Priority:
    /// 1. Explicit `local_path` if set
    /// 2. ModelLocator search order ($NAILBOT_MODELS_DIR → ~/.nailbot/models → {exe}/models)
    ///
    /// Returns the path even if it doesn't exist (caller should validate).
    pub fn effective_model_path(&self) -> PathBuf {
        if let Some(ref path) = self.local_path {
            return path.clone();
        }

        match ModelLocator::new().embedding_model_path(&self.model_id) {
            Ok(path) => path,
            Err(_) => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".nailbot")
                .join("models")
                .join("embeddings")
                .join(extract_model_name(&self.model_id)),
        }
    }

    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_device(mut self, device: DevicePreference) -> Self {
        self.device = device;
        self
    }
}

// ============================================================================
// HuggingFaceModelConfig
// ============================================================================

/// The subset of a HuggingFace `config.json` needed to pick a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuggingFaceModelConfig {
    #[serde(default)]
    pub architectures: Vec<String>,
    #[serde(default)]
    pub hidden_size: usize,
    #[serde(default = "default_max_position")]
    pub max_position_embeddings: usize,
    #[serde(default)]
    pub model_type: String,
}

fn default_max_position() -> usize {
    512
}

impl HuggingFaceModelConfig {
    pub fn infer_architecture(&self) -> ModelArchitecture {
        for arch in &self.architectures {
            let lower = arch.to_lowercase();
            if lower.contains("roberta") {
                return ModelArchitecture::Roberta;
            }
            if lower.contains("mpnet") {
                return ModelArchitecture::Mpnet;
            }
            if lower.contains("bert") {
                return ModelArchitecture::Bert;
            }
        }

        match self.model_type.to_lowercase().as_str() {
            "bert" => ModelArchitecture::Bert,
            "roberta" | "xlm-roberta" => ModelArchitecture::Roberta,
            "mpnet" => ModelArchitecture::Mpnet,
            _ => ModelArchitecture::Unknown,
        }
    }
}
