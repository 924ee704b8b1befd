//! Passage collection abstraction.
//!
//! The retrieval core only ever reads collections. Production collections are
//! provided by `nailbot-db` through [`crate::db_adapter::DbPassageCollection`];
//! tests substitute in-memory implementations.

pub use nailbot_db::vector::PassageMetadata;

/// A raw nearest-neighbor result, before normalization into a
/// [`crate::PassageHit`].
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRecord {
    pub id: String,
    /// Passage text. Records without it are dropped at normalization.
    pub document: Option<String>,
    pub metadata: PassageMetadata,
    /// Distance to the query vector; lower is closer.
    pub distance: Option<f32>,
}

/// Read-only nearest-neighbor search over one collection.
pub trait PassageCollection: Send + Sync {
    /// Collection name, e.g. `nail_kb`.
    fn name(&self) -> &str;

    /// Up to `top_k` records closest to `embedding`, closest first.
    fn query(&self, embedding: &[f32], top_k: usize) -> crate::RagResult<Vec<CollectionRecord>>;

    /// Number of stored passages.
    fn len(&self) -> crate::RagResult<usize>;

    fn is_empty(&self) -> crate::RagResult<bool> {
        Ok(self.len()? == 0)
    }
}
