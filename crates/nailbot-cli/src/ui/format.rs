//! Small text formatters for CLI output.

/// Truncate to at most `max_chars` characters, ending with `...` when cut.
/// Newlines are flattened to spaces.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_chars("kuku", 10), "kuku");
/// assert_eq!(truncate_chars("cekungan kecil pada kuku", 12), "cekungan ...");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    let flat = s.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    if max_chars <= 3 {
        return ".".repeat(max_chars);
    }
    let head: String = flat.chars().take(max_chars - 3).collect();
    format!("{}...", head)
}

/// Format a duration in milliseconds: `850ms`, `1.2s`.
pub fn format_millis(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("kuku", 10), "kuku");
        assert_eq!(truncate_chars("cekungan kecil pada kuku", 12), "cekungan ...");
        assert_eq!(truncate_chars("abcdef", 2), "..");
        assert_eq!(truncate_chars("baris\nkedua", 20), "baris kedua");
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate_chars("éééééé", 5), "éé...");
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(850), "850ms");
        assert_eq!(format_millis(1240), "1.2s");
    }
}
