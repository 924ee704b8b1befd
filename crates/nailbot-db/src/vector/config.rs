//! Collection configuration and on-disk metadata.

use super::traits::VectorMetric;
use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

// ============================================================================
// Constants
// ============================================================================

pub const DEFAULT_BACKEND: &str = "lancedb";

/// Filename for collection metadata, stored inside the collection directory.
pub const INDEX_META_FILENAME: &str = "index.meta.json";

pub const LANCEDB_TABLE_NAME: &str = "passages";

// ============================================================================
// VectorIndexConfig
// ============================================================================

/// Configuration for opening one passage collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorIndexConfig {
    /// Collection name, e.g. `nail_kb`.
    pub collection: String,

    pub dimension: usize,

    /// Collection directory.
    pub path: PathBuf,

    /// `lancedb` or `simple`.
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default)]
    pub metric: VectorMetric,

    /// Embedding model the collection was built with. When both the config
    /// and the stored metadata name a model they must agree.
    #[serde(default)]
    pub embedding_model: Option<String>,

    /// Create an empty collection when none exists. The retrieval path keeps
    /// this off so a missing index surfaces as an error.
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,
}

fn default_backend() -> String {
    DEFAULT_BACKEND.to_string()
}

fn default_create_if_missing() -> bool {
    true
}

impl VectorIndexConfig {
    pub fn new(collection: impl Into<String>, dimension: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            collection: collection.into(),
            dimension,
            path: path.into(),
            backend: DEFAULT_BACKEND.to_string(),
            metric: VectorMetric::Cosine,
            embedding_model: None,
            create_if_missing: true,
        }
    }

    /// Config for the collection `name` stored under the shared index root.
    pub fn for_collection(root: impl AsRef<Path>, name: &str, dimension: usize) -> Self {
        Self::new(name, dimension, root.as_ref().join(name))
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    pub fn with_metric(mut self, metric: VectorMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_embedding_model(mut self, model_id: impl Into<String>) -> Self {
        self.embedding_model = Some(model_id.into());
        self
    }

    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }
}

// ============================================================================
// VectorIndexMeta
// ============================================================================

/// Metadata persisted in `index.meta.json` next to the collection data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorIndexMeta {
    pub collection: String,
    pub backend: String,
    pub dimension: usize,
    pub metric: VectorMetric,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    /// Number of passages (approximate, may be stale).
    #[serde(default)]
    pub count: usize,

    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub updated_at: Option<String>,
}

fn default_schema_version() -> u32 {
    1
}

impl VectorIndexMeta {
    pub fn from_config(config: &VectorIndexConfig) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            collection: config.collection.clone(),
            backend: config.backend.clone(),
            dimension: config.dimension,
            metric: config.metric,
            embedding_model: config.embedding_model.clone(),
            count: 0,
            schema_version: default_schema_version(),
            created_at: Some(now.clone()),
            updated_at: Some(now),
        }
    }

    pub fn update_count(&mut self, count: usize) {
        self.count = count;
        self.updated_at = Some(chrono::Utc::now().to_rfc3339());
    }
}

// ============================================================================
// VectorIndexCompatibility
// ============================================================================

/// Result of comparing a config with the collection found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorIndexCompatibility {
    Compatible,
    NotFound,
    IncompatibleDimension { expected: usize, actual: usize },
    IncompatibleBackend { expected: String, actual: String },
    IncompatibleMetric {
        expected: VectorMetric,
        actual: VectorMetric,
    },
    IncompatibleModel { expected: String, actual: String },
    Corrupted(String),
}

impl VectorIndexCompatibility {
    pub fn is_compatible(&self) -> bool {
        matches!(self, VectorIndexCompatibility::Compatible)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VectorIndexCompatibility::NotFound)
    }
}

/// Check whether the collection on disk can be opened with `config`.
pub fn check_index_compatibility(config: &VectorIndexConfig) -> VectorIndexCompatibility {
    let meta_path = config.path.join(INDEX_META_FILENAME);

    if !meta_path.exists() {
        if config.path.is_dir() {
            let entries = config.path.read_dir().map(|rd| rd.count()).unwrap_or(0);
            if entries == 0 {
                return VectorIndexCompatibility::NotFound;
            }
            return VectorIndexCompatibility::Corrupted(
                "collection directory exists but has no metadata".to_string(),
            );
        }
        return VectorIndexCompatibility::NotFound;
    }

    let meta = match load_index_meta(&config.path) {
        Ok(meta) => meta,
        Err(e) => return VectorIndexCompatibility::Corrupted(e.to_string()),
    };

    if meta.dimension != config.dimension {
        return VectorIndexCompatibility::IncompatibleDimension {
            expected: config.dimension,
            actual: meta.dimension,
        };
    }
    if meta.backend != config.backend {
        return VectorIndexCompatibility::IncompatibleBackend {
            expected: config.backend.clone(),
            actual: meta.backend,
        };
    }
    if meta.metric != config.metric {
        return VectorIndexCompatibility::IncompatibleMetric {
            expected: config.metric,
            actual: meta.metric,
        };
    }
    if let (Some(expected), Some(actual)) = (&config.embedding_model, meta.embedding_model) {
        if *expected != actual {
            return VectorIndexCompatibility::IncompatibleModel {
                expected: expected.clone(),
                actual,
            };
        }
    }

    VectorIndexCompatibility::Compatible
}

pub fn load_index_meta(path: &Path) -> DbResult<VectorIndexMeta> {
    let meta_path = path.join(INDEX_META_FILENAME);
    debug!("Loading collection metadata from {:?}", meta_path);

    let content = fs::read_to_string(&meta_path).map_err(|e| {
        DbError::vector_io(&meta_path, format!("Failed to read metadata: {}", e))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| DbError::vector_parse(&meta_path, format!("Failed to parse metadata: {}", e)))
}

pub fn write_index_meta(path: &Path, meta: &VectorIndexMeta) -> DbResult<()> {
    let meta_path = path.join(INDEX_META_FILENAME);
    debug!("Writing collection metadata to {:?}", meta_path);

    fs::create_dir_all(path)?;
    fs::write(&meta_path, serde_json::to_string_pretty(meta)?)?;
    Ok(())
}
