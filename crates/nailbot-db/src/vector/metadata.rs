//! Typed passage metadata.
//!
//! The builder stores only a handful of fields per passage. They are modelled
//! as explicit optionals instead of an open key/value map; unknown keys in
//! stored JSON are ignored on read.

use serde::{Deserialize, Serialize};

/// Metadata stored alongside each passage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassageMetadata {
    /// File name for Local passages, URL for Scholar passages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Classifier label the passage is about, when the builder knew it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Human readable citation (authors, title, journal, year).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,

    /// Position of the chunk within its source document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
}

impl PassageMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
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

    pub fn with_chunk_index(mut self, index: u32) -> Self {
        self.chunk_index = Some(index);
        self
    }
}
