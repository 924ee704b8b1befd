//! Passage hits and record normalization.
//!
//! Raw collection records are validated into [`PassageHit`]s at the
//! collection boundary. Records without usable text are skipped and counted;
//! missing metadata degrades to defaults.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collection::CollectionRecord;

/// Source recorded for passages whose metadata has none.
pub const UNKNOWN_SOURCE: &str = "unknown";

// ============================================================================
// Bucket
// ============================================================================

/// Which collection a hit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Curated first-party passages.
    Local,
    /// Passages from academic literature.
    Scholar,
}

impl Bucket {
    pub const ALL: [Bucket; 2] = [Bucket::Local, Bucket::Scholar];

    /// Sort rank: Local content is always presented first.
    pub fn rank(&self) -> u8 {
        match self {
            Bucket::Local => 0,
            Bucket::Scholar => 1,
        }
    }

    /// Citation tag prefix (`L1`, `S1`, ...).
    pub fn tag_prefix(&self) -> char {
        match self {
            Bucket::Local => 'L',
            Bucket::Scholar => 'S',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Local => "local",
            Bucket::Scholar => "scholar",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "l" => Ok(Bucket::Local),
            "scholar" | "s" => Ok(Bucket::Scholar),
            other => Err(format!("Unknown bucket '{other}'. Use local or scholar.")),
        }
    }
}

// ============================================================================
// PassageHit
// ============================================================================

/// One retrieved passage, stamped with its bucket.
///
/// `score` is a distance: lower means more similar. `None` means no ranking
/// signal and sorts last. Two hits are the same passage iff `(id, bucket)`
/// match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageHit {
    pub text: String,

    #[serde(default = "default_source")]
    pub source: String,

    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,

    pub bucket: Bucket,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

fn default_source() -> String {
    UNKNOWN_SOURCE.to_string()
}

impl PassageHit {
    pub fn new(id: impl Into<String>, bucket: Bucket, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: default_source(),
            id: id.into(),
            label: None,
            citation: None,
            bucket,
            score: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_citation(mut self, citation: impl Into<String>) -> Self {
        self.citation = Some(citation.into());
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    /// Deduplication key.
    pub fn key(&self) -> (&str, Bucket) {
        (&self.id, self.bucket)
    }

    /// Text length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Hits produced from one query result, plus the number of records dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedHits {
    pub hits: Vec<PassageHit>,
    pub skipped: usize,
}

/// Validate raw collection records into hits for `bucket`.
///
/// - blank or missing document text: record skipped and counted
/// - blank or missing source: `"unknown"`
/// - blank label or citation: `None`
/// - non-finite distance: no score
pub fn normalize_records(records: Vec<CollectionRecord>, bucket: Bucket) -> NormalizedHits {
    let mut normalized = NormalizedHits::default();

    for record in records {
        let Some(text) = record.document.filter(|d| !d.trim().is_empty()) else {
            normalized.skipped += 1;
            continue;
        };

        let meta = record.metadata;
        normalized.hits.push(PassageHit {
            text,
            source: non_blank(meta.source).unwrap_or_else(default_source),
            id: record.id,
            label: non_blank(meta.label),
            citation: non_blank(meta.citation),
            bucket,
            score: record.distance.filter(|d| d.is_finite()),
        });
    }

    if normalized.skipped > 0 {
        debug!(
            bucket = %bucket,
            skipped = normalized.skipped,
            "skipped records without passage text"
        );
    }

    normalized
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
