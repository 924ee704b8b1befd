//! In-memory backends for unit tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::collection::{CollectionRecord, PassageCollection, PassageMetadata};
use crate::embedding::EmbeddingBackend;
use crate::errors::{RagError, RagResult};
use crate::hit::Bucket;
use crate::retrieval_context::{BackendFactory, RetrievalContext};

// ============================================================================
// HashingEmbedder
// ============================================================================

/// Deterministic embedder: hashes the text into a unit vector.
pub(crate) struct HashingEmbedder {
    dimension: usize,
    fail_on: Option<String>,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail_on: None,
        }
    }

    /// Fails for exactly this input text.
    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        self.fail_on = Some(text.into());
        self
    }
}

impl EmbeddingBackend for HashingEmbedder {
    fn model_id(&self) -> &str {
        "test/hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[&str]) -> RagResult<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|text| {
                if self.fail_on.as_deref() == Some(*text) {
                    return Err(RagError::Embedding(format!("cannot embed '{text}'")));
                }
                Ok(hash_vector(text, self.dimension))
            })
            .collect()
    }
}

pub(crate) fn hash_vector(text: &str, dimension: usize) -> Vec<f32> {
    let mut v: Vec<f32> = (0..dimension)
        .map(|i| {
            let mut hasher = DefaultHasher::new();
            (text, i).hash(&mut hasher);
            (hasher.finish() % 1000) as f32 / 1000.0 - 0.5
        })
        .collect();
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

// ============================================================================
// FixedCollection
// ============================================================================

/// Collection returning canned records regardless of the query vector.
///
/// In rotating mode each query continues where the previous one stopped, so
/// repeated queries eventually return every record.
pub(crate) struct FixedCollection {
    name: String,
    records: Vec<CollectionRecord>,
    cursor: Option<AtomicUsize>,
    fail: bool,
    queries: AtomicUsize,
}

impl FixedCollection {
    pub fn new(name: &str, records: Vec<CollectionRecord>) -> Self {
        Self {
            name: name.to_string(),
            records,
            cursor: None,
            fail: false,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn empty(name: &str) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn rotating(name: &str, records: Vec<CollectionRecord>) -> Self {
        Self {
            cursor: Some(AtomicUsize::new(0)),
            ..Self::new(name, records)
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::empty(name)
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl PassageCollection for FixedCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn query(&self, _embedding: &[f32], top_k: usize) -> RagResult<Vec<CollectionRecord>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::CollectionQuery {
                collection: self.name.clone(),
                message: "simulated failure".to_string(),
            });
        }

        let n = self.records.len();
        let take = top_k.min(n);
        match &self.cursor {
            None => Ok(self.records[..take].to_vec()),
            Some(cursor) => {
                let start = cursor.fetch_add(take, Ordering::SeqCst);
                Ok((0..take)
                    .map(|i| self.records[(start + i) % n].clone())
                    .collect())
            }
        }
    }

    fn len(&self) -> RagResult<usize> {
        Ok(self.records.len())
    }
}

pub(crate) fn record(id: &str, text: &str, source: &str, distance: Option<f32>) -> CollectionRecord {
    CollectionRecord {
        id: id.to_string(),
        document: Some(text.to_string()),
        metadata: PassageMetadata::new().with_source(source),
        distance,
    }
}

// ============================================================================
// CountingFactory
// ============================================================================

#[derive(Default)]
pub(crate) struct FactoryCounts {
    embedders: AtomicUsize,
    collections: AtomicUsize,
}

impl FactoryCounts {
    pub fn embedders(&self) -> usize {
        self.embedders.load(Ordering::SeqCst)
    }

    pub fn collections(&self) -> usize {
        self.collections.load(Ordering::SeqCst)
    }
}

/// Factory handing out shared test backends and counting creations.
pub(crate) struct CountingFactory {
    embedder: Option<Arc<dyn EmbeddingBackend>>,
    local: Arc<dyn PassageCollection>,
    scholar: Arc<dyn PassageCollection>,
    counts: Arc<FactoryCounts>,
}

impl CountingFactory {
    pub fn new(
        embedder: impl EmbeddingBackend + 'static,
        local: impl PassageCollection + 'static,
        scholar: impl PassageCollection + 'static,
    ) -> Self {
        Self {
            embedder: Some(Arc::new(embedder)),
            local: Arc::new(local),
            scholar: Arc::new(scholar),
            counts: Arc::default(),
        }
    }

    /// A factory over collections the test keeps a handle to.
    pub fn shared(
        embedder: impl EmbeddingBackend + 'static,
        local: Arc<FixedCollection>,
        scholar: Arc<FixedCollection>,
    ) -> Self {
        Self {
            embedder: Some(Arc::new(embedder)),
            local,
            scholar,
            counts: Arc::default(),
        }
    }

    /// A factory whose embedder can never be created.
    pub fn failing_embedder() -> Self {
        Self {
            embedder: None,
            ..Self::new(
                HashingEmbedder::new(4),
                FixedCollection::empty("nail_kb"),
                FixedCollection::empty("nail_kb_scholar"),
            )
        }
    }

    pub fn counts(&self) -> Arc<FactoryCounts> {
        Arc::clone(&self.counts)
    }
}

impl BackendFactory for CountingFactory {
    fn create_embedder(&self) -> RagResult<Arc<dyn EmbeddingBackend>> {
        self.counts.embedders.fetch_add(1, Ordering::SeqCst);
        self.embedder
            .clone()
            .ok_or_else(|| RagError::EmbedderUnavailable("model not found".to_string()))
    }

    fn open_collection(
        &self,
        bucket: Bucket,
        _dimension: usize,
    ) -> RagResult<Arc<dyn PassageCollection>> {
        self.counts.collections.fetch_add(1, Ordering::SeqCst);
        Ok(match bucket {
            Bucket::Local => Arc::clone(&self.local),
            Bucket::Scholar => Arc::clone(&self.scholar),
        })
    }
}

/// Context over the given test backends.
pub(crate) fn context(
    embedder: impl EmbeddingBackend + 'static,
    local: impl PassageCollection + 'static,
    scholar: impl PassageCollection + 'static,
) -> RetrievalContext {
    RetrievalContext::new(Box::new(CountingFactory::new(embedder, local, scholar)))
}
