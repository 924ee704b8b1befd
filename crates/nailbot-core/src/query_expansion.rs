//! Query expansion for multi-query retrieval.
//!
//! A single embedding of the literal user question under-retrieves when the
//! question is colloquial or mixes Indonesian and English. The expander turns
//! one prompt into a short, ordered list of variants:
//!
//! 1. **Seeds**: the prompt, its lowercase form, and a domain-suffixed copy
//!    per language (`"{q} kuku"`, `"{q} nail"`). An empty prompt seeds with
//!    the bare domain terms instead.
//! 2. **Label aliases**: when the classifier label is known, one variant per
//!    alias phrase (see [`NailLabel::aliases`]).
//! 3. **General terms**: each of [`GENERAL_ALIASES`] appended to the prompt.
//!
//! Variants are trimmed, empties dropped, duplicates removed keeping the
//! first occurrence, and the list is cut to `max_variants`.
//!
//! ## Example
//!
//! ```ignore
//! use nailbot_core::query_expansion::QueryExpander;
//!
//! let variants = QueryExpander::with_defaults().expand("apa penyebabnya?", Some("pitting"));
//! // ["apa penyebabnya?", "apa penyebabnya? kuku", "apa penyebabnya? nail",
//! //  "apa penyebabnya? | label: pitting | pitting", ...]
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::labels::{NailLabel, GENERAL_ALIASES};

/// Upper bound on variants per request.
pub const DEFAULT_MAX_VARIANTS: usize = 10;

/// Seeds used when the prompt is empty.
const EMPTY_PROMPT_SEEDS: &[&str] = &["kuku", "nail"];

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for query expansion behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionConfig {
    /// Maximum number of query variants to generate. Values below 1 are
    /// treated as 1.
    pub max_variants: usize,

    /// Whether to add label alias variants.
    pub use_label_aliases: bool,

    /// Whether to add the general broadening terms.
    pub use_general_terms: bool,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_variants: DEFAULT_MAX_VARIANTS,
            use_label_aliases: true,
            use_general_terms: true,
        }
    }
}

impl ExpansionConfig {
    pub fn with_max_variants(mut self, max_variants: usize) -> Self {
        self.max_variants = max_variants;
        self
    }
}

// ============================================================================
// QueryExpander
// ============================================================================

/// Expands a prompt into retrieval variants.
#[derive(Debug, Clone, Default)]
pub struct QueryExpander {
    config: ExpansionConfig,
}

impl QueryExpander {
    pub fn new(config: ExpansionConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ExpansionConfig::default())
    }

    /// Expand `prompt` into an ordered, duplicate-free list of variants.
    ///
    /// The result is never empty. An unrecognized `preferred_label` adds no
    /// alias variants and is not an error.
    pub fn expand(&self, prompt: &str, preferred_label: Option<&str>) -> Vec<String> {
        let q = prompt.trim();
        let mut candidates: Vec<String> = Vec::new();

        if q.is_empty() {
            candidates.extend(EMPTY_PROMPT_SEEDS.iter().map(|s| s.to_string()));
        } else {
            candidates.push(q.to_string());
            candidates.push(q.to_lowercase());
            candidates.push(format!("{} kuku", q));
            candidates.push(format!("{} nail", q));
        }

        if self.config.use_label_aliases {
            if let Some(label) = preferred_label.and_then(NailLabel::parse) {
                for alias in label.aliases() {
                    candidates.push(if q.is_empty() {
                        alias.to_string()
                    } else {
                        format!("{} | label: {} | {}", q, label.as_str(), alias)
                    });
                }
            }
        }

        if self.config.use_general_terms {
            for term in GENERAL_ALIASES {
                candidates.push(if q.is_empty() {
                    term.to_string()
                } else {
                    format!("{} {}", q, term)
                });
            }
        }

        dedup_variants(candidates, self.config.max_variants.max(1))
    }

    pub fn config(&self) -> &ExpansionConfig {
        &self.config
    }
}

/// Expand with the default configuration.
pub fn expand_query(prompt: &str, preferred_label: Option<&str>) -> Vec<String> {
    QueryExpander::with_defaults().expand(prompt, preferred_label)
}

// ============================================================================
// Helpers
// ============================================================================

/// Trim, drop empties, keep the first occurrence of each string, cap at `limit`.
fn dedup_variants(candidates: Vec<String>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut variants = Vec::with_capacity(limit);

    for candidate in candidates {
        let trimmed = candidate.trim();
        if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
            continue;
        }
        variants.push(trimmed.to_string());
        if variants.len() == limit {
            break;
        }
    }

    variants
}
