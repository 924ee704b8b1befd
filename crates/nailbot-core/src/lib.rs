//! # nailbot-core
//!
//! Retrieval and context assembly for the nail-image assistant.
//!
//! Given a user prompt and the classifier's predicted label, this crate
//! expands the prompt into query variants, searches two vector collections
//! (curated Local passages and Scholar literature), merges and ranks the hits,
//! and renders them into a bounded, citation-tagged context for a text
//! generator.
//!
//! ## Main Types
//!
//! - [`RetrievalContext`] – lazily initialized embedder and collection handles
//! - [`PassageHit`] – one retrieved passage, tagged with its [`Bucket`]
//! - [`ContextFormatter`] / [`FormattedContext`] – bounded context rendering
//! - [`Explainer`] – retrieval-grounded prediction explanations
//! - [`RagError`] – domain-specific error type
//!
//! ## Modules
//!
//! - [`query_expansion`] – prompt to query variants
//! - [`retrieval`] – multi-query retrieval and `retrieve_smart`
//! - [`merge`] – deduplication and ranking
//! - [`context`] – context and reference rendering
//! - [`explain`] – generation prompt and fallback templates
//! - [`config`] – `RagConfig` and retrieval defaults
//!
//! ## Example
//!
//! ```ignore
//! use nailbot_core::{format_context, retrieve_smart, RagConfig, RetrievalContext};
//!
//! let config = RagConfig::load(None)?;
//! let defaults = config.retrieval.clone();
//! let ctx = RetrievalContext::from_config(config);
//!
//! let hits = retrieve_smart(&ctx, "apa penyebabnya?", Some("pitting"), 2, 3, 8)?;
//! let formatted = format_context(&hits, defaults.max_chars);
//! println!("{}", formatted.context);
//! ```

// Modules
pub mod collection;
pub mod config;
pub mod context;
pub mod db_adapter;
pub mod embedding;
pub mod errors;
pub mod explain;
pub mod hit;
pub mod labels;
pub mod merge;
pub mod model_adapter;
pub mod query_expansion;
pub mod retrieval;
pub mod retrieval_context;

#[cfg(test)]
mod test_support;

// Re-exports
pub use collection::{CollectionRecord, PassageCollection, PassageMetadata};
pub use config::{RagConfig, RetrievalDefaults};
pub use context::{format_context, ContextFormatter, FormattedContext, NO_CONTEXT};
pub use embedding::EmbeddingBackend;
pub use errors::{RagError, RagResult};
pub use explain::{
    build_generation_prompt, format_confidence_id, is_nail_domain, ExplanationRequest, Explainer,
    GenerationBackend, Intent, LabelProb, Prediction,
};
pub use hit::{normalize_records, Bucket, NormalizedHits, PassageHit};
pub use labels::{aliases_for, NailLabel, GENERAL_ALIASES};
pub use merge::merge_hits;
pub use query_expansion::{expand_query, ExpansionConfig, QueryExpander};
pub use retrieval::{
    retrieve_smart, retrieve_smart_with_report, MultiQueryRetriever, RetrievalOptions,
    RetrievalOutcome, RetrievalReport,
};
pub use retrieval_context::{BackendFactory, DefaultBackendFactory, RetrievalContext};

// Adapters
pub use db_adapter::{collection_config, DbPassageCollection, IntoCollectionResult};
pub use model_adapter::{IntoRagResult, ModelEmbeddingBackend};
