//! Configuration for the retrieval core.
//!
//! Loaded from `~/.nailbot/config.yaml` (or an explicit path). A missing file
//! yields defaults so nailbot works without any manual setup. Environment
//! variables are applied on top of the file:
//!
//! | Variable | Field |
//! |---|---|
//! | `NAILBOT_INDEX_DIR` | `indexDir` |
//! | `NAILBOT_COLL_LOCAL` | `localCollection` |
//! | `NAILBOT_COLL_SCHOLAR` | `scholarCollection` |
//! | `NAILBOT_EMB_MODEL` | `embedding.modelId` |
//! | `NAILBOT_DEVICE` | `embedding.device` |
//!
//! ## Example
//!
//! ```yaml
//! indexDir: /srv/nailbot/rag_index
//! vectorBackend: lancedb
//! embedding:
//!   modelId: sentence-transformers/all-MiniLM-L6-v2
//!   device: cpu
//! retrieval:
//!   kLocalEach: 2
//!   kSchEach: 3
//!   maxTotal: 8
//!   maxChars: 3600
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use nailbot_db::vector::{available_backends, VectorMetric, DEFAULT_BACKEND};
use nailbot_model::{DevicePreference, EmbeddingConfig};

use crate::context::TRUNCATION_FLOOR;
use crate::errors::{RagError, RagResult};
use crate::hit::Bucket;
use crate::query_expansion::DEFAULT_MAX_VARIANTS;

pub const ENV_INDEX_DIR: &str = "NAILBOT_INDEX_DIR";
pub const ENV_COLL_LOCAL: &str = "NAILBOT_COLL_LOCAL";
pub const ENV_COLL_SCHOLAR: &str = "NAILBOT_COLL_SCHOLAR";
pub const ENV_EMB_MODEL: &str = "NAILBOT_EMB_MODEL";
pub const ENV_DEVICE: &str = "NAILBOT_DEVICE";

pub const DEFAULT_LOCAL_COLLECTION: &str = "nail_kb";
pub const DEFAULT_SCHOLAR_COLLECTION: &str = "nail_kb_scholar";

// ============================================================================
// RagConfig
// ============================================================================

/// Top-level nailbot configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagConfig {
    /// Root directory holding one sub-directory per collection.
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    #[serde(default = "default_local_collection")]
    pub local_collection: String,

    #[serde(default = "default_scholar_collection")]
    pub scholar_collection: String,

    /// Must match the model the index builder used.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// `lancedb` or `simple`.
    #[serde(default = "default_vector_backend")]
    pub vector_backend: String,

    #[serde(default)]
    pub metric: VectorMetric,

    #[serde(default)]
    pub retrieval: RetrievalDefaults,

    #[serde(default = "default_max_variants")]
    pub max_variants: usize,
}

fn default_index_dir() -> PathBuf {
    RagConfig::default_dir()
        .map(|d| d.join("rag_index"))
        .unwrap_or_else(|| PathBuf::from("rag_index"))
}

fn default_local_collection() -> String {
    DEFAULT_LOCAL_COLLECTION.to_string()
}

fn default_scholar_collection() -> String {
    DEFAULT_SCHOLAR_COLLECTION.to_string()
}

fn default_vector_backend() -> String {
    DEFAULT_BACKEND.to_string()
}

fn default_max_variants() -> usize {
    DEFAULT_MAX_VARIANTS
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            index_dir: default_index_dir(),
            local_collection: default_local_collection(),
            scholar_collection: default_scholar_collection(),
            embedding: EmbeddingConfig::default(),
            vector_backend: default_vector_backend(),
            metric: VectorMetric::default(),
            retrieval: RetrievalDefaults::default(),
            max_variants: default_max_variants(),
        }
    }
}

impl RagConfig {
    /// Load from `path` (or the default location) and apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if the file exists but cannot be
    /// parsed.
    pub fn load(path: Option<&Path>) -> RagResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_path(path)?,
            None => match Self::default_path() {
                Some(path) => Self::from_path(&path)?,
                None => {
                    tracing::debug!("Could not determine home directory, using default config");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides();
        for warning in config.validate() {
            tracing::warn!("Config warning: {}", warning);
        }
        Ok(config)
    }

    /// Parse a config file. A missing file yields defaults; no environment
    /// overrides are applied.
    pub fn from_path(path: &Path) -> RagResult<Self> {
        if !path.exists() {
            tracing::debug!("Config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| RagError::ConfigIo {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        // An empty file is a valid, all-defaults config
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content).map_err(|e| RagError::InvalidConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// `~/.nailbot`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".nailbot"))
    }

    /// `~/.nailbot/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join("config.yaml"))
    }

    /// Apply `NAILBOT_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Blank values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(dir) = get(ENV_INDEX_DIR) {
            self.index_dir = PathBuf::from(dir);
        }
        if let Some(name) = get(ENV_COLL_LOCAL) {
            self.local_collection = name;
        }
        if let Some(name) = get(ENV_COLL_SCHOLAR) {
            self.scholar_collection = name;
        }
        if let Some(model) = get(ENV_EMB_MODEL) {
            self.embedding.model_id = model;
        }
        if let Some(device) = get(ENV_DEVICE) {
            match device.parse::<DevicePreference>() {
                Ok(pref) => self.embedding.device = pref,
                Err(e) => tracing::warn!("Ignoring {}: {}", ENV_DEVICE, e),
            }
        }
    }

    /// Collection name for a bucket.
    pub fn collection_name(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::Local => &self.local_collection,
            Bucket::Scholar => &self.scholar_collection,
        }
    }

    /// Collect non-fatal configuration problems.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.retrieval.validate();

        if self.local_collection == self.scholar_collection {
            warnings.push(format!(
                "localCollection and scholarCollection are both '{}'; every passage will be retrieved twice",
                self.local_collection
            ));
        }
        if self.max_variants == 0 {
            warnings.push("maxVariants is 0; only the prompt itself will be queried".to_string());
        }
        let backends = available_backends();
        if !backends.contains(&self.vector_backend.as_str()) {
            warnings.push(format!(
                "vectorBackend '{}' is not compiled into this build (available: [{}])",
                self.vector_backend,
                backends.join(", ")
            ));
        }

        warnings
    }
}

// ============================================================================
// RetrievalDefaults
// ============================================================================

/// Default retrieval and formatting parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalDefaults {
    /// Local hits per variant.
    #[serde(default = "default_k_local_each")]
    pub k_local_each: usize,

    /// Scholar hits per variant.
    #[serde(default = "default_k_sch_each")]
    pub k_sch_each: usize,

    /// Hits kept after merging.
    #[serde(default = "default_max_total")]
    pub max_total: usize,

    /// Character budget for the assembled context.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_k_local_each() -> usize {
    2
}

fn default_k_sch_each() -> usize {
    3
}

fn default_max_total() -> usize {
    8
}

fn default_max_chars() -> usize {
    3600
}

impl Default for RetrievalDefaults {
    fn default() -> Self {
        Self {
            k_local_each: default_k_local_each(),
            k_sch_each: default_k_sch_each(),
            max_total: default_max_total(),
            max_chars: default_max_chars(),
        }
    }
}

impl RetrievalDefaults {
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.k_local_each == 0 && self.k_sch_each == 0 {
            warnings.push(
                "kLocalEach and kSchEach are both 0; retrieval requests will be rejected"
                    .to_string(),
            );
        }
        if self.max_total == 0 {
            warnings.push("maxTotal is 0; retrieval requests will be rejected".to_string());
        }
        if self.max_chars <= TRUNCATION_FLOOR + 2 {
            warnings.push(format!(
                "maxChars {} is at or below the truncation floor; contexts will usually be empty",
                self.max_chars
            ));
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.local_collection, "nail_kb");
        assert_eq!(config.scholar_collection, "nail_kb_scholar");
        assert_eq!(config.max_variants, 10);
        assert_eq!(
            config.retrieval,
            RetrievalDefaults {
                k_local_each: 2,
                k_sch_each: 3,
                max_total: 8,
                max_chars: 3600
            }
        );
        assert!(config.index_dir.ends_with("rag_index"));
        assert_eq!(
            config.embedding.model_id,
            "sentence-transformers/all-MiniLM-L6-v2"
        );
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
indexDir: /srv/nailbot/rag_index
vectorBackend: simple
embedding:
  device: cpu
retrieval:
  kSchEach: 5
"#;
        let config: RagConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.index_dir, PathBuf::from("/srv/nailbot/rag_index"));
        assert_eq!(config.vector_backend, "simple");
        assert_eq!(config.embedding.device, DevicePreference::Cpu);
        assert_eq!(config.retrieval.k_sch_each, 5);
        assert_eq!(config.retrieval.k_local_each, 2);
        assert_eq!(config.local_collection, "nail_kb");
    }

    #[test]
    fn test_from_path_missing_and_empty() {
        let temp = TempDir::new().unwrap();
        let missing = RagConfig::from_path(&temp.path().join("nope.yaml")).unwrap();
        assert_eq!(missing, RagConfig::default());

        let empty = temp.path().join("config.yaml");
        fs::write(&empty, "\n").unwrap();
        assert_eq!(RagConfig::from_path(&empty).unwrap(), RagConfig::default());
    }

    #[test]
    fn test_from_path_invalid_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "retrieval: [not, a, map]\n").unwrap();

        let err = RagConfig::from_path(&path).unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig { .. }));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_INDEX_DIR, "/tmp/idx"),
            (ENV_COLL_LOCAL, "kb_v2"),
            (ENV_COLL_SCHOLAR, "  "),
            (ENV_EMB_MODEL, "intfloat/multilingual-e5-small"),
            (ENV_DEVICE, "CPU"),
        ]
        .into_iter()
        .collect();

        let mut config = RagConfig::default();
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.index_dir, PathBuf::from("/tmp/idx"));
        assert_eq!(config.local_collection, "kb_v2");
        assert_eq!(config.scholar_collection, "nail_kb_scholar");
        assert_eq!(config.embedding.model_id, "intfloat/multilingual-e5-small");
        assert_eq!(config.embedding.device, DevicePreference::Cpu);
        assert_eq!(config.collection_name(Bucket::Local), "kb_v2");
    }

    #[test]
    fn test_invalid_device_override_is_ignored() {
        let mut config = RagConfig::default();
        config.apply_overrides_from(|k| (k == ENV_DEVICE).then(|| "tpu".to_string()));
        assert_eq!(config.embedding.device, DevicePreference::Auto);
    }

    #[test]
    fn test_validate_warnings() {
        let mut config = RagConfig {
            vector_backend: "faiss".to_string(),
            ..Default::default()
        };
        config.retrieval.k_local_each = 0;
        config.retrieval.k_sch_each = 0;
        config.retrieval.max_chars = 40;

        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("both 0")));
        assert!(warnings.iter().any(|w| w.contains("truncation floor")));
        assert!(warnings.iter().any(|w| w.contains("faiss")));
    }
}
