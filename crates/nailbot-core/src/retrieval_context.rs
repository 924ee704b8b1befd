//! Lazily initialized retrieval handles.
//!
//! [`RetrievalContext`] owns the embedder and the two collection handles.
//! Each handle is created by a [`BackendFactory`] on first use and reused by
//! later requests. [`RetrievalContext::reset`] drops them so the next request
//! re-initializes (e.g. after an index rebuild).

use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::collection::PassageCollection;
use crate::config::RagConfig;
use crate::db_adapter::DbPassageCollection;
use crate::embedding::EmbeddingBackend;
use crate::errors::{RagError, RagResult};
use crate::hit::Bucket;
use crate::model_adapter::ModelEmbeddingBackend;
use crate::query_expansion::{ExpansionConfig, QueryExpander};

// ============================================================================
// BackendFactory
// ============================================================================

/// Creates the embedder and opens collections.
pub trait BackendFactory: Send + Sync {
    fn create_embedder(&self) -> RagResult<Arc<dyn EmbeddingBackend>>;

    /// Open the collection for `bucket`; `dimension` is the embedder's.
    fn open_collection(
        &self,
        bucket: Bucket,
        dimension: usize,
    ) -> RagResult<Arc<dyn PassageCollection>>;
}

/// Production factory: Candle embedder and `nailbot-db` collections.
#[derive(Debug, Clone)]
pub struct DefaultBackendFactory {
    config: RagConfig,
}

impl DefaultBackendFactory {
    pub fn new(config: RagConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }
}

impl BackendFactory for DefaultBackendFactory {
    fn create_embedder(&self) -> RagResult<Arc<dyn EmbeddingBackend>> {
        let backend = ModelEmbeddingBackend::from_config(&self.config.embedding)?;
        Ok(Arc::new(backend))
    }

    fn open_collection(
        &self,
        bucket: Bucket,
        dimension: usize,
    ) -> RagResult<Arc<dyn PassageCollection>> {
        let collection = DbPassageCollection::open(&self.config, bucket, dimension)?;
        Ok(Arc::new(collection))
    }
}

// ============================================================================
// RetrievalContext
// ============================================================================

type Slot<T> = RwLock<Option<Arc<T>>>;

/// Process-owned retrieval state, passed explicitly into retrieval calls.
pub struct RetrievalContext {
    factory: Box<dyn BackendFactory>,
    expander: QueryExpander,
    embedder: Slot<dyn EmbeddingBackend>,
    local: Slot<dyn PassageCollection>,
    scholar: Slot<dyn PassageCollection>,
}

impl std::fmt::Debug for RetrievalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalContext")
            .field("expander", &self.expander)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl RetrievalContext {
    pub fn new(factory: Box<dyn BackendFactory>) -> Self {
        Self {
            factory,
            expander: QueryExpander::with_defaults(),
            embedder: RwLock::new(None),
            local: RwLock::new(None),
            scholar: RwLock::new(None),
        }
    }

    /// Context backed by the production factory.
    pub fn from_config(config: RagConfig) -> Self {
        let expansion = ExpansionConfig::default().with_max_variants(config.max_variants);
        Self::new(Box::new(DefaultBackendFactory::new(config)))
            .with_expander(QueryExpander::new(expansion))
    }

    pub fn with_expander(mut self, expander: QueryExpander) -> Self {
        self.expander = expander;
        self
    }

    pub fn expander(&self) -> &QueryExpander {
        &self.expander
    }

    /// The shared embedder, created on first use.
    pub fn embedder(&self) -> RagResult<Arc<dyn EmbeddingBackend>> {
        get_or_init(&self.embedder, || {
            info!("initializing embedding backend");
            self.factory.create_embedder()
        })
    }

    /// The shared collection for `bucket`, opened on first use.
    pub fn collection(&self, bucket: Bucket) -> RagResult<Arc<dyn PassageCollection>> {
        let slot = match bucket {
            Bucket::Local => &self.local,
            Bucket::Scholar => &self.scholar,
        };
        get_or_init(slot, || {
            let dimension = self.embedder()?.dimension();
            info!(bucket = %bucket, dimension, "opening collection");
            self.factory.open_collection(bucket, dimension)
        })
    }

    /// Drop all cached handles. The next call re-initializes them.
    pub fn reset(&self) {
        debug!("resetting retrieval context");
        clear(&self.embedder);
        clear(&self.local);
        clear(&self.scholar);
    }

    /// Whether any handle is currently cached.
    pub fn is_initialized(&self) -> bool {
        is_set(&self.embedder) || is_set(&self.local) || is_set(&self.scholar)
    }
}

fn get_or_init<T: ?Sized>(
    slot: &Slot<T>,
    init: impl FnOnce() -> RagResult<Arc<T>>,
) -> RagResult<Arc<T>> {
    {
        let guard = slot
            .read()
            .map_err(|e| RagError::internal(format!("Failed to acquire read lock: {}", e)))?;
        if let Some(handle) = guard.as_ref() {
            return Ok(Arc::clone(handle));
        }
    }

    let mut guard = slot
        .write()
        .map_err(|e| RagError::internal(format!("Failed to acquire write lock: {}", e)))?;
    // Another request may have initialized the slot while we waited
    if let Some(handle) = guard.as_ref() {
        return Ok(Arc::clone(handle));
    }
    let handle = init()?;
    *guard = Some(Arc::clone(&handle));
    Ok(handle)
}

fn clear<T: ?Sized>(slot: &Slot<T>) {
    // A poisoned slot is cleared too; its contents are discarded anyway
    let mut guard = match slot.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = None;
}

fn is_set<T: ?Sized>(slot: &Slot<T>) -> bool {
    slot.read().map(|g| g.is_some()).unwrap_or(false)
}
