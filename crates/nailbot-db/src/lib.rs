//! # nailbot-db
//!
//! Storage layer for nailbot: the passage collections searched at request
//! time.
//!
//! Each collection (the curated Local corpus and the Scholar literature
//! corpus) lives in its own directory under the index root and is populated
//! offline by the index builder. `nailbot-core` only reads them.
//!
//! ```text
//! nailbot-cli → nailbot-core → (traits)
//!                    ↑
//!               nailbot-db     (passage collections)
//!               nailbot-model  (embeddings)
//! ```
//!
//! ## Features
//!
//! - `lancedb` (default): LanceDB storage with ANN search
//! - `simple`: JSONL file with linear scan, for tests and small corpora
//!
//! ## Usage
//!
//! ```ignore
//! use nailbot_db::vector::{open_vector_index, VectorIndexConfig};
//!
//! let config = VectorIndexConfig::for_collection("/srv/rag_index", "nail_kb", 384)
//!     .with_create_if_missing(false);
//! let collection = open_vector_index(&config)?;
//! let matches = collection.query(&embedding, 3)?;
//! ```

pub mod error;
pub mod vector;

pub use error::{DbError, DbResult};
