//! Passage collection storage.
//!
//! ## Available Backends
//!
//! - `lancedb` (default): LanceDB with ANN search
//! - `simple`: JSONL-backed linear scan
//!
//! Every backend reports a *distance* per match (lower is closer) so that
//! results from both collections can be ranked on one scale.

mod backend;
mod config;
mod metadata;
mod traits;

pub use config::{
    check_index_compatibility, load_index_meta, write_index_meta, VectorIndexCompatibility,
    VectorIndexConfig, VectorIndexMeta, DEFAULT_BACKEND, INDEX_META_FILENAME, LANCEDB_TABLE_NAME,
};
pub use metadata::PassageMetadata;
pub use traits::{PassageInsert, PassageMatch, VectorIndexBackend, VectorMetric};

pub use backend::{available_backends, open_vector_index};

#[cfg(feature = "lancedb")]
pub use backend::LanceDbVectorIndex;

#[cfg(feature = "simple")]
pub use backend::SimpleFileVectorIndex;
