//! Collection backend implementations.

#[cfg(feature = "lancedb")]
mod lancedb;

#[cfg(feature = "simple")]
mod simple;

#[cfg(feature = "lancedb")]
pub use self::lancedb::LanceDbVectorIndex;

#[cfg(feature = "simple")]
pub use simple::SimpleFileVectorIndex;

use super::config::{
    check_index_compatibility, write_index_meta, VectorIndexCompatibility, VectorIndexConfig,
    VectorIndexMeta,
};
use super::traits::VectorIndexBackend;
use crate::error::{DbError, DbResult};
use std::sync::Arc;
use tracing::{debug, info};

/// Open a passage collection.
///
/// 1. Compare the config with the metadata on disk
/// 2. Create an empty collection if missing and `create_if_missing` is set
/// 3. Open the configured backend
///
/// # Errors
///
/// - `IndexNotFound` when the collection is missing and creation is off
/// - `DimensionMismatch` / `IndexIncompatible` when the stored collection
///   was built differently
/// - `BackendNotAvailable` for backends not compiled in
pub fn open_vector_index(config: &VectorIndexConfig) -> DbResult<Arc<dyn VectorIndexBackend>> {
    debug!(
        collection = %config.collection,
        path = ?config.path,
        backend = %config.backend,
        "opening collection"
    );

    match check_index_compatibility(config) {
        VectorIndexCompatibility::Compatible => {}
        VectorIndexCompatibility::NotFound if config.create_if_missing => {
            info!(collection = %config.collection, "collection not found, creating empty collection");
            write_index_meta(&config.path, &VectorIndexMeta::from_config(config))?;
        }
        VectorIndexCompatibility::NotFound => {
            return Err(DbError::IndexNotFound {
                collection: config.collection.clone(),
                path: config.path.clone(),
            });
        }
        VectorIndexCompatibility::IncompatibleDimension { expected, actual } => {
            return Err(DbError::DimensionMismatch { expected, actual });
        }
        VectorIndexCompatibility::IncompatibleBackend { expected, actual } => {
            return Err(DbError::index_incompatible(
                &config.collection,
                format!("backend mismatch: expected '{}', found '{}'", expected, actual),
            ));
        }
        VectorIndexCompatibility::IncompatibleMetric { expected, actual } => {
            return Err(DbError::index_incompatible(
                &config.collection,
                format!("metric mismatch: expected '{}', found '{}'", expected, actual),
            ));
        }
        VectorIndexCompatibility::IncompatibleModel { expected, actual } => {
            return Err(DbError::index_incompatible(
                &config.collection,
                format!(
                    "built with embedding model '{}' but '{}' is configured; rebuild the index",
                    actual, expected
                ),
            ));
        }
        VectorIndexCompatibility::Corrupted(msg) => {
            return Err(DbError::index_incompatible(
                &config.collection,
                format!("collection corrupted: {}", msg),
            ));
        }
    }

    match config.backend.as_str() {
        #[cfg(feature = "lancedb")]
        "lancedb" => Ok(Arc::new(LanceDbVectorIndex::open(config)?)),

        #[cfg(feature = "simple")]
        "simple" => Ok(Arc::new(SimpleFileVectorIndex::open(config)?)),

        backend => Err(DbError::BackendNotAvailable {
            backend: backend.to_string(),
            reason: format!(
                "compiled backends: [{}]",
                available_backends().join(", ")
            ),
        }),
    }
}

/// Names of the backends compiled into this build.
#[allow(clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<&'static str> {
    let mut backends = Vec::new();

    #[cfg(feature = "lancedb")]
    backends.push("lancedb");

    #[cfg(feature = "simple")]
    backends.push("simple");

    backends
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_collection_without_create_is_not_found() {
        let temp = TempDir::new().unwrap();
        let config = VectorIndexConfig::for_collection(temp.path(), "nail_kb", 8)
            .with_create_if_missing(false);

        let err = open_vector_index(&config).err().unwrap();
        assert!(err.is_not_found(), "unexpected error: {err}");
    }

    #[test]
    fn test_unknown_backend() {
        let temp = TempDir::new().unwrap();
        let config =
            VectorIndexConfig::for_collection(temp.path(), "nail_kb", 8).with_backend("faiss");

        match open_vector_index(&config) {
            Err(DbError::BackendNotAvailable { backend, .. }) => assert_eq!(backend, "faiss"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("faiss backend should not open"),
        }
    }
}
