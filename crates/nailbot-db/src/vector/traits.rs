//! Collection traits and core types.

use crate::error::DbResult;
use serde::{Deserialize, Serialize};

use super::metadata::PassageMetadata;

// ============================================================================
// VectorMetric
// ============================================================================

/// Distance metric used by a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorMetric {
    /// `1 - cosine_similarity`, in `[0, 2]`.
    #[default]
    Cosine,
    /// Negated dot product.
    Dot,
    /// Euclidean distance.
    L2,
}

impl VectorMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorMetric::Cosine => "cosine",
            VectorMetric::Dot => "dot",
            VectorMetric::L2 => "l2",
        }
    }

    /// Distance between two vectors under this metric. Lower is closer.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            VectorMetric::Cosine => 1.0 - cosine_similarity(a, b),
            VectorMetric::Dot => -dot_product(a, b),
            VectorMetric::L2 => euclidean_distance(a, b),
        }
    }
}

impl std::fmt::Display for VectorMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VectorMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" | "ip" => Ok(Self::Dot),
            "l2" | "euclidean" => Ok(Self::L2),
            other => Err(format!("Unknown metric '{other}'. Use cosine, dot or l2.")),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product(a, b);
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

// ============================================================================
// PassageInsert
// ============================================================================

/// A passage written by the offline index builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageInsert {
    /// Stable passage id, e.g. `"pitting.md::3"` or a PubMed id.
    pub id: String,
    pub vector: Vec<f32>,
    /// The passage text returned to the retriever.
    pub document: String,
    #[serde(default)]
    pub metadata: PassageMetadata,
}

impl PassageInsert {
    pub fn new(id: impl Into<String>, vector: Vec<f32>, document: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vector,
            document: document.into(),
            metadata: PassageMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: PassageMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

// ============================================================================
// PassageMatch
// ============================================================================

/// A single nearest-neighbor match as stored, before any validation.
///
/// `document` is optional because older builders wrote rows without text;
/// callers decide what to do with such rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageMatch {
    pub id: String,
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub metadata: PassageMetadata,
    /// Distance to the query vector (lower is closer).
    #[serde(default)]
    pub distance: Option<f32>,
}

impl PassageMatch {
    pub fn new(id: impl Into<String>, document: Option<String>) -> Self {
        Self {
            id: id.into(),
            document,
            metadata: PassageMetadata::default(),
            distance: None,
        }
    }

    pub fn with_metadata(mut self, metadata: PassageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_distance(mut self, distance: f32) -> Self {
        self.distance = Some(distance);
        self
    }
}

// ============================================================================
// VectorIndexBackend Trait
// ============================================================================

/// Storage backend for one passage collection.
///
/// - Implementations are `Send + Sync`; queries may run concurrently.
/// - `query` returns at most `limit` matches ordered by ascending distance.
/// - `upsert` replaces passages with the same id.
pub trait VectorIndexBackend: Send + Sync {
    /// Nearest-neighbor search.
    fn query(&self, embedding: &[f32], limit: usize) -> DbResult<Vec<PassageMatch>>;

    fn upsert(&self, passages: &[PassageInsert]) -> DbResult<()>;

    fn delete(&self, ids: &[String]) -> DbResult<()>;

    /// Flush pending writes to persistent storage.
    fn flush(&self) -> DbResult<()>;

    fn len(&self) -> DbResult<usize>;

    fn is_empty(&self) -> DbResult<bool> {
        Ok(self.len()? == 0)
    }

    fn dimension(&self) -> usize;

    fn metric(&self) -> VectorMetric;

    /// Name of the collection this backend serves.
    fn collection(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_metric_names() {
        assert_eq!(VectorMetric::Cosine.as_str(), "cosine");
        assert_eq!("euclidean".parse::<VectorMetric>().unwrap(), VectorMetric::L2);
        assert_eq!(VectorMetric::default(), VectorMetric::Cosine);
    }

    #[test]
    fn test_cosine_distance() {
        let a = [1.0, 0.0, 0.0];
        assert!(VectorMetric::Cosine.distance(&a, &a).abs() < 1e-6);
        assert!((VectorMetric::Cosine.distance(&a, &[0.0, 1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((VectorMetric::Cosine.distance(&a, &[-1.0, 0.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_and_dot_distance() {
        assert!((VectorMetric::L2.distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
        assert!((VectorMetric::Dot.distance(&[1.0, 2.0], &[3.0, 4.0]) + 11.0).abs() < 1e-6);
    }

    #[test]
    fn test_passage_match_builder() {
        let m = PassageMatch::new("pitting.md::0", Some("Pitting adalah...".into()))
            .with_metadata(PassageMetadata::new().with_source("pitting.md"))
            .with_distance(0.25);
        assert_eq!(m.distance, Some(0.25));
        assert_eq!(m.metadata.source.as_deref(), Some("pitting.md"));
    }
}
