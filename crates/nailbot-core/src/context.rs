//! Citation-tagged context assembly.
//!
//! Ranked hits are rendered into two blocks, Local first:
//!
//! ```text
//! === KONTEN LOKAL ===
//! [L1] <passage>
//! (Sumber: <source>)
//!
//! === LITERATUR AKADEMIK ===
//! [S1] <abstract, capped at 1200 chars>
//! (Sumber: <url>)
//! ```
//!
//! Both blocks share one character budget. Each rendered block costs its
//! length plus 2. When a block does not fit, a truncated copy is emitted if
//! more than [`TRUNCATION_FLOOR`] characters remain, and rendering stops.
//! Tags are committed only for emitted blocks, so numbering is gapless.
//! Every emitted Scholar block also yields one reference line.
//!
//! All lengths are counted in chars.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::hit::{Bucket, PassageHit, UNKNOWN_SOURCE};

pub const LOCAL_HEADER: &str = "=== KONTEN LOKAL ===";
pub const SCHOLAR_HEADER: &str = "=== LITERATUR AKADEMIK ===";

/// Context emitted when no hit could be rendered.
pub const NO_CONTEXT: &str = "Tidak ada konteks yang relevan.";

/// Maximum Scholar body length before the ellipsis.
pub const SCHOLAR_BODY_CAP: usize = 1200;

/// A truncated final block is only emitted if more than this many chars remain.
pub const TRUNCATION_FLOOR: usize = 50;

/// Per-block budget overhead.
const BLOCK_SEPARATOR: usize = 2;

const ELLIPSIS: char = '…';

// ============================================================================
// FormattedContext
// ============================================================================

/// Rendered context plus the Scholar reference list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedContext {
    pub context: String,
    pub references: Vec<String>,
    /// Number of Local blocks rendered (`L1..Ln`).
    pub local_rendered: usize,
    /// Number of Scholar blocks rendered (`S1..Sn`).
    pub scholar_rendered: usize,
    /// Rendering stopped on the budget before all hits were considered.
    pub budget_exhausted: bool,
}

impl FormattedContext {
    /// The "no relevant context" result.
    pub fn empty() -> Self {
        Self {
            context: NO_CONTEXT.to_string(),
            references: Vec::new(),
            local_rendered: 0,
            scholar_rendered: 0,
            budget_exhausted: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.local_rendered == 0 && self.scholar_rendered == 0
    }
}

// ============================================================================
// ContextFormatter
// ============================================================================

/// Renders ranked hits into a bounded context. Pure and idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextFormatter {
    scholar_body_cap: usize,
    truncation_floor: usize,
}

impl Default for ContextFormatter {
    fn default() -> Self {
        Self {
            scholar_body_cap: SCHOLAR_BODY_CAP,
            truncation_floor: TRUNCATION_FLOOR,
        }
    }
}

impl ContextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scholar_body_cap(mut self, cap: usize) -> Self {
        self.scholar_body_cap = cap;
        self
    }

    pub fn with_truncation_floor(mut self, floor: usize) -> Self {
        self.truncation_floor = floor;
        self
    }

    /// Render `hits` (already ranked) within `max_chars`.
    pub fn format(&self, hits: &[PassageHit], max_chars: usize) -> FormattedContext {
        let mut local_blocks: Vec<String> = Vec::new();
        let mut scholar_blocks: Vec<String> = Vec::new();
        let mut references: Vec<String> = Vec::new();
        let mut used = 0usize;
        let mut budget_exhausted = false;

        for hit in hits {
            let text = hit.text.trim();
            if text.is_empty() {
                continue;
            }
            let source = match hit.source.trim() {
                "" => UNKNOWN_SOURCE,
                s => s,
            };

            let blocks = match hit.bucket {
                Bucket::Local => &mut local_blocks,
                Bucket::Scholar => &mut scholar_blocks,
            };
            let tag = format!("{}{}", hit.bucket.tag_prefix(), blocks.len() + 1);
            let body = match hit.bucket {
                Bucket::Local => Cow::Borrowed(text),
                Bucket::Scholar => cap_chars(text, self.scholar_body_cap),
            };
            let block = format!("[{tag}] {body}\n(Sumber: {source})");
            let len = block.chars().count();

            if used + len + BLOCK_SEPARATOR > max_chars {
                budget_exhausted = true;
                let remain = max_chars.saturating_sub(used + BLOCK_SEPARATOR);
                if remain > self.truncation_floor {
                    let mut cut = take_chars(&block, remain).trim_end().to_string();
                    cut.push(ELLIPSIS);
                    blocks.push(cut);
                    if hit.bucket == Bucket::Scholar {
                        references.push(reference_line(&tag, hit));
                    }
                }
                break;
            }

            blocks.push(block);
            if hit.bucket == Bucket::Scholar {
                references.push(reference_line(&tag, hit));
            }
            used += len + BLOCK_SEPARATOR;
            if used >= max_chars {
                budget_exhausted = true;
                break;
            }
        }

        if local_blocks.is_empty() && scholar_blocks.is_empty() {
            return FormattedContext {
                budget_exhausted,
                ..FormattedContext::empty()
            };
        }

        let mut parts: Vec<&str> = Vec::new();
        if !local_blocks.is_empty() {
            parts.push(LOCAL_HEADER);
            parts.extend(local_blocks.iter().map(String::as_str));
        }
        if !scholar_blocks.is_empty() {
            if !parts.is_empty() {
                parts.push("");
            }
            parts.push(SCHOLAR_HEADER);
            parts.extend(scholar_blocks.iter().map(String::as_str));
        }

        FormattedContext {
            context: parts.join("\n").trim().to_string(),
            references,
            local_rendered: local_blocks.len(),
            scholar_rendered: scholar_blocks.len(),
            budget_exhausted,
        }
    }
}

/// Format with the default formatter.
pub fn format_context(hits: &[PassageHit], max_chars: usize) -> FormattedContext {
    ContextFormatter::default().format(hits, max_chars)
}

// ============================================================================
// Helpers
// ============================================================================

/// `[S1] [citation](source)` when cited, else `[S1] source`.
///
/// A blank source is rendered as `"unknown"`, the same as in the block.
fn reference_line(tag: &str, hit: &PassageHit) -> String {
    let citation = hit
        .citation
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let source = match hit.source.trim() {
        "" => UNKNOWN_SOURCE,
        s => s,
    };

    match citation {
        Some(c) => format!("[{tag}] [{c}]({source})"),
        None => format!("[{tag}] {source}"),
    }
}

/// The first `n` chars of `s`.
fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// `s` unchanged if it fits in `cap` chars, else cut, right-trimmed, plus `…`.
fn cap_chars(s: &str, cap: usize) -> Cow<'_, str> {
    if s.chars().count() <= cap {
        return Cow::Borrowed(s);
    }
    let mut cut = take_chars(s, cap).trim_end().to_string();
    cut.push(ELLIPSIS);
    Cow::Owned(cut)
}
