//! Multi-query retrieval over the Local and Scholar collections.
//!
//! ## Flow
//!
//! 1. Expand the prompt into variants ([`crate::query_expansion`])
//! 2. For each variant: embed once, query Local (`k_local_each`) and
//!    Scholar (`k_sch_each`), normalize the records into hits
//! 3. Merge across variants ([`crate::merge`]) and keep `max_total`
//!
//! Variants are independent and are queried in parallel with `rayon`; the
//! per-variant results are collected back in variant order, so output is
//! deterministic.
//!
//! ## Failure policy
//!
//! By default the first embedding or collection error aborts the call. With
//! [`RetrievalOptions::skip_failed_variants`] failed variants are logged and
//! reported in [`RetrievalOutcome::failed_variants`] instead; if every variant
//! fails the call still errors, so an empty result always means "no matches".
//! Failing to obtain the embedder or a collection at all is never skipped.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collection::PassageCollection;
use crate::config::RetrievalDefaults;
use crate::embedding::EmbeddingBackend;
use crate::errors::{RagError, RagResult};
use crate::hit::{normalize_records, Bucket, NormalizedHits, PassageHit};
use crate::merge::merge_hits;
use crate::retrieval_context::RetrievalContext;

// ============================================================================
// Options and results
// ============================================================================

/// Parameters for one smart retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalOptions {
    pub k_local_each: usize,
    pub k_sch_each: usize,
    pub max_total: usize,

    /// Skip variants whose embedding or query fails instead of aborting.
    #[serde(default)]
    pub skip_failed_variants: bool,

    /// Query variants on the rayon pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_parallel() -> bool {
    true
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self::from_defaults(&RetrievalDefaults::default())
    }
}

impl RetrievalOptions {
    pub fn from_defaults(defaults: &RetrievalDefaults) -> Self {
        Self {
            k_local_each: defaults.k_local_each,
            k_sch_each: defaults.k_sch_each,
            max_total: defaults.max_total,
            skip_failed_variants: false,
            parallel: default_parallel(),
        }
    }

    pub fn with_k(mut self, k_local_each: usize, k_sch_each: usize) -> Self {
        self.k_local_each = k_local_each;
        self.k_sch_each = k_sch_each;
        self
    }

    pub fn with_max_total(mut self, max_total: usize) -> Self {
        self.max_total = max_total;
        self
    }

    pub fn with_skip_failed_variants(mut self, skip: bool) -> Self {
        self.skip_failed_variants = skip;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Reject parameters that can never produce a hit.
    pub fn validate(&self) -> RagResult<()> {
        validate_k(self.k_local_each, self.k_sch_each)?;
        if self.max_total == 0 {
            return Err(RagError::invalid_request("max_total must be at least 1"));
        }
        Ok(())
    }
}

fn validate_k(k_local_each: usize, k_sch_each: usize) -> RagResult<()> {
    if k_local_each == 0 && k_sch_each == 0 {
        return Err(RagError::invalid_request(
            "k_local_each and k_sch_each are both 0",
        ));
    }
    Ok(())
}

/// Raw multi-query results, before merging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalOutcome {
    /// One list per (variant x queried collection), in variant order, Local
    /// before Scholar. Collections with `k = 0` contribute no list.
    pub hit_lists: Vec<Vec<PassageHit>>,
    /// Records dropped at normalization.
    pub skipped_records: usize,
    /// Variants skipped in lenient mode.
    pub failed_variants: Vec<String>,
}

impl RetrievalOutcome {
    pub fn total_hits(&self) -> usize {
        self.hit_lists.iter().map(Vec::len).sum()
    }
}

/// Smart retrieval result with diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalReport {
    pub hits: Vec<PassageHit>,
    pub variants: Vec<String>,
    /// Hits collected across all variants, before deduplication.
    pub candidates: usize,
    pub skipped_records: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_variants: Vec<String>,
    pub elapsed_ms: u64,
}

// ============================================================================
// MultiQueryRetriever
// ============================================================================

/// Runs every variant against both collections.
pub struct MultiQueryRetriever<'a> {
    ctx: &'a RetrievalContext,
    skip_failed_variants: bool,
    parallel: bool,
}

struct Target {
    bucket: Bucket,
    top_k: usize,
    collection: Arc<dyn PassageCollection>,
}

impl<'a> MultiQueryRetriever<'a> {
    pub fn new(ctx: &'a RetrievalContext) -> Self {
        Self {
            ctx,
            skip_failed_variants: false,
            parallel: true,
        }
    }

    pub fn with_skip_failed_variants(mut self, skip: bool) -> Self {
        self.skip_failed_variants = skip;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Query both collections with every variant.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidRequest`] if both `k` values are 0
    /// - embedder or collection initialization errors, always
    /// - the first variant error, unless variants are skipped
    /// - [`RagError::AllVariantsFailed`] if skipping left nothing
    pub fn retrieve(
        &self,
        variants: &[String],
        k_local_each: usize,
        k_sch_each: usize,
    ) -> RagResult<RetrievalOutcome> {
        validate_k(k_local_each, k_sch_each)?;
        if variants.is_empty() {
            return Ok(RetrievalOutcome::default());
        }

        let embedder = self.ctx.embedder()?;
        let mut targets = Vec::with_capacity(2);
        for (bucket, top_k) in [(Bucket::Local, k_local_each), (Bucket::Scholar, k_sch_each)] {
            if top_k > 0 {
                targets.push(Target {
                    bucket,
                    top_k,
                    collection: self.ctx.collection(bucket)?,
                });
            }
        }

        let run = |variant: &String| query_variant(embedder.as_ref(), &targets, variant);
        let results: Vec<RagResult<Vec<NormalizedHits>>> = if self.parallel {
            variants.par_iter().map(run).collect()
        } else {
            variants.iter().map(run).collect()
        };

        let mut outcome = RetrievalOutcome::default();
        let mut first_error: Option<String> = None;

        for (variant, result) in variants.iter().zip(results) {
            match result {
                Ok(per_collection) => {
                    for normalized in per_collection {
                        outcome.skipped_records += normalized.skipped;
                        outcome.hit_lists.push(normalized.hits);
                    }
                }
                Err(e) if self.skip_failed_variants => {
                    warn!(variant = %variant, error = %e, "skipping failed query variant");
                    first_error.get_or_insert_with(|| e.to_string());
                    outcome.failed_variants.push(variant.clone());
                }
                Err(e) => return Err(e),
            }
        }

        if outcome.failed_variants.len() == variants.len() {
            return Err(RagError::AllVariantsFailed {
                count: variants.len(),
                first: first_error.unwrap_or_default(),
            });
        }

        debug!(
            variant_count = variants.len(),
            candidates = outcome.total_hits(),
            skipped = outcome.skipped_records,
            failed = outcome.failed_variants.len(),
            "multi-query retrieval finished"
        );
        Ok(outcome)
    }
}

fn query_variant(
    embedder: &dyn EmbeddingBackend,
    targets: &[Target],
    variant: &str,
) -> RagResult<Vec<NormalizedHits>> {
    let vector = embedder.embed_one(variant)?;
    targets
        .iter()
        .map(|target| {
            let records = target.collection.query(&vector, target.top_k)?;
            Ok(normalize_records(records, target.bucket))
        })
        .collect()
}

// ============================================================================
// Smart retrieval
// ============================================================================

/// Expand, retrieve, merge and keep the top `max_total` hits.
pub fn retrieve_smart(
    ctx: &RetrievalContext,
    prompt: &str,
    preferred_label: Option<&str>,
    k_local_each: usize,
    k_sch_each: usize,
    max_total: usize,
) -> RagResult<Vec<PassageHit>> {
    let options = RetrievalOptions::default()
        .with_k(k_local_each, k_sch_each)
        .with_max_total(max_total);
    Ok(retrieve_smart_with_report(ctx, prompt, preferred_label, &options)?.hits)
}

/// [`retrieve_smart`] plus the variants, counts and timing.
pub fn retrieve_smart_with_report(
    ctx: &RetrievalContext,
    prompt: &str,
    preferred_label: Option<&str>,
    options: &RetrievalOptions,
) -> RagResult<RetrievalReport> {
    options.validate()?;
    let start = Instant::now();

    let variants = ctx.expander().expand(prompt, preferred_label);
    let outcome = MultiQueryRetriever::new(ctx)
        .with_skip_failed_variants(options.skip_failed_variants)
        .with_parallel(options.parallel)
        .retrieve(&variants, options.k_local_each, options.k_sch_each)?;

    let candidates = outcome.total_hits();
    let mut hits = merge_hits(outcome.hit_lists);
    hits.truncate(options.max_total);

    let elapsed_ms = start.elapsed().as_millis() as u64;
    debug!(
        variant_count = variants.len(),
        candidates,
        kept = hits.len(),
        skipped = outcome.skipped_records,
        elapsed_ms,
        "smart retrieval finished"
    );

    Ok(RetrievalReport {
        hits,
        variants,
        candidates,
        skipped_records: outcome.skipped_records,
        failed_variants: outcome.failed_variants,
        elapsed_ms,
    })
}
