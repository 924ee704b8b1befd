//! Adapter layer for nailbot-db.
//!
//! ```text
//! retrieval (MultiQueryRetriever)
//!        ↓
//!   db_adapter (this module) - PassageCollection over VectorIndexBackend
//!        ↓
//!     nailbot-db (LanceDB / JSONL collections)
//! ```
//!
//! Collections are opened with `create_if_missing(false)`: the retrieval path
//! never creates an index, so a missing one surfaces as
//! [`RagError::CollectionUnavailable`].

use std::sync::Arc;

use nailbot_db::vector::{open_vector_index, PassageMatch, VectorIndexBackend, VectorIndexConfig};
use nailbot_db::DbError;

use crate::collection::{CollectionRecord, PassageCollection};
use crate::config::RagConfig;
use crate::errors::{RagError, RagResult};
use crate::hit::Bucket;

// ============================================================================
// Error Conversion
// ============================================================================

/// Convert an error raised while *opening* a collection.
pub fn from_db_open_error(collection: &str, err: DbError) -> RagError {
    match err {
        DbError::Io(io_err) => RagError::Io(io_err),
        other => RagError::CollectionUnavailable {
            collection: collection.to_string(),
            message: other.to_string(),
        },
    }
}

/// Convert an error raised while *querying* an opened collection.
pub fn from_db_query_error(collection: &str, err: DbError) -> RagError {
    RagError::CollectionQuery {
        collection: collection.to_string(),
        message: err.to_string(),
    }
}

/// Extension trait for converting storage results on a named collection.
pub trait IntoCollectionResult<T> {
    fn into_query_result(self, collection: &str) -> RagResult<T>;
}

impl<T> IntoCollectionResult<T> for nailbot_db::DbResult<T> {
    fn into_query_result(self, collection: &str) -> RagResult<T> {
        self.map_err(|e| from_db_query_error(collection, e))
    }
}

impl From<PassageMatch> for CollectionRecord {
    fn from(m: PassageMatch) -> Self {
        Self {
            id: m.id,
            document: m.document,
            metadata: m.metadata,
            distance: m.distance,
        }
    }
}

// ============================================================================
// DbPassageCollection
// ============================================================================

/// Core collection over a `nailbot-db` backend.
pub struct DbPassageCollection {
    name: String,
    inner: Arc<dyn VectorIndexBackend>,
}

impl std::fmt::Debug for DbPassageCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbPassageCollection")
            .field("name", &self.name)
            .field("dimension", &self.inner.dimension())
            .field("metric", &self.inner.metric())
            .finish()
    }
}

impl DbPassageCollection {
    pub fn new(inner: Arc<dyn VectorIndexBackend>) -> Self {
        Self {
            name: inner.collection().to_string(),
            inner,
        }
    }

    /// Open the collection for `bucket` as described by `config`.
    pub fn open(config: &RagConfig, bucket: Bucket, dimension: usize) -> RagResult<Self> {
        let db_config = collection_config(config, bucket, dimension);
        let inner = open_vector_index(&db_config)
            .map_err(|e| from_db_open_error(&db_config.collection, e))?;
        Ok(Self::new(inner))
    }

    pub fn inner(&self) -> &dyn VectorIndexBackend {
        self.inner.as_ref()
    }
}

/// Storage config for the collection of `bucket`.
pub fn collection_config(config: &RagConfig, bucket: Bucket, dimension: usize) -> VectorIndexConfig {
    VectorIndexConfig::for_collection(&config.index_dir, config.collection_name(bucket), dimension)
        .with_backend(config.vector_backend.clone())
        .with_metric(config.metric)
        .with_embedding_model(config.embedding.model_id.clone())
        .with_create_if_missing(false)
}

impl PassageCollection for DbPassageCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn query(&self, embedding: &[f32], top_k: usize) -> RagResult<Vec<CollectionRecord>> {
        let matches = self.inner.query(embedding, top_k).into_query_result(&self.name)?;
        Ok(matches.into_iter().map(CollectionRecord::from).collect())
    }

    fn len(&self) -> RagResult<usize> {
        self.inner.len().into_query_result(&self.name)
    }
}
