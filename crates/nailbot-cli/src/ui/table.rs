//! Table rendering for CLI output using comfy-table.
//!
//! | Command | Table Function |
//! |---------|----------------|
//! | `nailbot labels` | `render_labels_table()` |
//! | `nailbot ask` | `render_hits_table()`, `render_metrics_table()` |

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, ColumnConstraint, ContentArrangement, Table, Width};

use nailbot_core::{NailLabel, PassageHit};

use super::color::terminal_width;
use super::format::truncate_chars;

/// Render the known labels with their expansion aliases.
///
/// # Example Output
///
/// ```text
/// LABEL        ALIASES
/// pitting      pitting, cekungan kuku, cekungan kecil pada kuku, nail pitting
/// clubbing     clubbing, ujung jari membulat, ...
/// ```
pub fn render_labels_table(labels: &[NailLabel]) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_width(terminal_width() as u16);
    table.set_header(vec![Cell::new("LABEL"), Cell::new("ALIASES")]);
    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(28)), // LABEL
    ]);

    for label in labels {
        table.add_row(vec![
            Cell::new(label.as_str()),
            Cell::new(label.aliases().join(", ")),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render retrieved hits in rank order.
///
/// # Example Output
///
/// ```text
/// #  BUCKET    DIST   SOURCE          TEXT
/// 1  local     0.121  kb/pitting.md   Pitting tampak sebagai cekungan ...
/// 2  scholar   0.300  https://doi...  Nail pitting is associated with ...
/// ```
pub fn render_hits_table(hits: &[PassageHit]) -> String {
    if hits.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new("#").set_alignment(CellAlignment::Right),
        Cell::new("BUCKET"),
        Cell::new("DIST").set_alignment(CellAlignment::Right),
        Cell::new("SOURCE"),
        Cell::new("TEXT"),
    ]);

    // Leave the remaining width to the text preview
    let preview_chars = terminal_width().saturating_sub(60).clamp(20, 80);

    for (i, hit) in hits.iter().enumerate() {
        let distance = hit
            .score
            .map(|s| format!("{:.3}", s))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(i + 1).set_alignment(CellAlignment::Right),
            Cell::new(hit.bucket.as_str()),
            Cell::new(distance).set_alignment(CellAlignment::Right),
            Cell::new(truncate_chars(&hit.source, 28)),
            Cell::new(truncate_chars(&hit.text, preview_chars)),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render a simple key-value metrics table.
///
/// # Example Output
///
/// ```text
/// METRIC         VALUE
/// Variants          10
/// Candidates        50
/// ```
pub fn render_metrics_table(metrics: &[(&str, String)]) -> String {
    if metrics.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new("METRIC"),
        Cell::new("VALUE").set_alignment(CellAlignment::Right),
    ]);
    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(14)), // METRIC
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),  // VALUE
    ]);

    for (key, value) in metrics {
        table.add_row(vec![
            Cell::new(*key),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }

    table.trim_fmt().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nailbot_core::Bucket;

    #[test]
    fn test_labels_table_lists_every_label() {
        let output = render_labels_table(&NailLabel::ALL);
        assert!(output.contains("LABEL"));
        for label in NailLabel::ALL {
            assert!(output.contains(label.as_str()), "missing {}", label);
        }
        assert!(output.contains("jari kebiruan"));
    }

    #[test]
    fn test_hits_table() {
        let hits = vec![
            PassageHit::new("l1", Bucket::Local, "Pitting tampak sebagai cekungan kecil.")
                .with_source("kb/pitting.md")
                .with_score(0.1214),
            PassageHit::new("s1", Bucket::Scholar, "Nail pitting is associated with psoriasis."),
        ];
        let output = render_hits_table(&hits);
        assert!(output.contains("BUCKET"));
        assert!(output.contains("kb/pitting.md"));
        assert!(output.contains("0.121"));
        assert!(output.contains("scholar"));
        assert!(output.contains("unknown"));
    }

    #[test]
    fn test_empty_tables() {
        assert!(render_labels_table(&[]).is_empty());
        assert!(render_hits_table(&[]).is_empty());
        assert!(render_metrics_table(&[]).is_empty());
    }

    #[test]
    fn test_metrics_table() {
        let output = render_metrics_table(&[("Variants", "10".to_string())]);
        assert!(output.contains("METRIC"));
        assert!(output.contains("Variants"));
        assert!(output.contains("10"));
    }
}
