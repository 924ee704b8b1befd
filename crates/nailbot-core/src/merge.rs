//! Cross-variant deduplication and ranking.
//!
//! The same passage is usually returned by several query variants. Hits are
//! keyed by `(id, bucket)`; the best-scoring copy survives and keeps the
//! position of the first copy seen. Survivors are then ranked:
//!
//! 1. bucket (Local before Scholar)
//! 2. score ascending, missing scores last
//! 3. longer text first
//!
//! The sort is stable, so fully tied hits keep their first-seen order.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::hit::{Bucket, PassageHit};

/// Merge hit lists into one deduplicated, ranked list.
pub fn merge_hits<I>(hit_lists: I) -> Vec<PassageHit>
where
    I: IntoIterator<Item = Vec<PassageHit>>,
{
    let mut positions: HashMap<(String, Bucket), usize> = HashMap::new();
    let mut merged: Vec<PassageHit> = Vec::new();

    for hit in hit_lists.into_iter().flatten() {
        let key = (hit.id.clone(), hit.bucket);
        match positions.get(&key) {
            None => {
                positions.insert(key, merged.len());
                merged.push(hit);
            }
            Some(&pos) => {
                if improves_on(hit.score, merged[pos].score) {
                    merged[pos] = hit;
                }
            }
        }
    }

    merged.sort_by(rank_order);
    merged
}

/// A defined score replaces a missing one or a strictly worse one. A missing
/// score never displaces anything, so among unscored copies the first wins.
fn improves_on(incoming: Option<f32>, existing: Option<f32>) -> bool {
    match (incoming, existing) {
        (Some(_), None) => true,
        (Some(new), Some(old)) => new < old,
        (None, _) => false,
    }
}

/// Ranking comparator used after deduplication.
pub fn rank_order(a: &PassageHit, b: &PassageHit) -> Ordering {
    a.bucket
        .rank()
        .cmp(&b.bucket.rank())
        .then_with(|| score_key(a).total_cmp(&score_key(b)))
        .then_with(|| b.char_len().cmp(&a.char_len()))
}

fn score_key(hit: &PassageHit) -> f32 {
    hit.score.unwrap_or(f32::INFINITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn local(id: &str, text: &str, score: Option<f32>) -> PassageHit {
        let hit = PassageHit::new(id, Bucket::Local, text);
        match score {
            Some(s) => hit.with_score(s),
            None => hit,
        }
    }

    fn scholar(id: &str, text: &str, score: Option<f32>) -> PassageHit {
        PassageHit {
            bucket: Bucket::Scholar,
            ..local(id, text, score)
        }
    }

    fn ids(hits: &[PassageHit]) -> Vec<(&str, Bucket)> {
        hits.iter().map(|h| h.key()).collect()
    }

    #[test]
    fn test_keeps_lowest_score_per_key() {
        let merged = merge_hits(vec![
            vec![local("a", "first copy", Some(0.5))],
            vec![local("a", "better copy", Some(0.2))],
            vec![local("a", "worse copy", Some(0.9))],
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "better copy");
        assert_eq!(merged[0].score, Some(0.2));
    }

    #[test]
    fn test_missing_score_never_displaces_present_one() {
        let merged = merge_hits(vec![
            vec![local("a", "scored", Some(0.4))],
            vec![local("a", "unscored", None)],
        ]);
        assert_eq!(merged[0].text, "scored");

        let merged = merge_hits(vec![
            vec![local("a", "unscored", None)],
            vec![local("a", "scored", Some(0.4))],
        ]);
        assert_eq!(merged[0].text, "scored");
    }

    #[test]
    fn test_first_write_wins_among_unscored() {
        let merged = merge_hits(vec![
            vec![local("a", "first", None)],
            vec![local("a", "second and much longer", None)],
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "first");
    }

    #[test]
    fn test_equal_score_does_not_replace() {
        let merged = merge_hits(vec![
            vec![local("a", "first", Some(0.3))],
            vec![local("a", "second", Some(0.3))],
        ]);
        assert_eq!(merged[0].text, "first");
    }

    #[test]
    fn test_same_id_in_different_buckets_is_distinct() {
        let merged = merge_hits(vec![vec![
            local("p1", "local text", Some(0.3)),
            scholar("p1", "scholar text", Some(0.1)),
        ]]);
        assert_eq!(merged.len(), 2);
        assert_eq!(ids(&merged), vec![("p1", Bucket::Local), ("p1", Bucket::Scholar)]);
    }

    #[test]
    fn test_local_precedes_scholar_even_with_worse_score() {
        let merged = merge_hits(vec![vec![
            scholar("s1", "x", Some(0.01)),
            local("l1", "y", None),
            local("l2", "z", Some(0.9)),
        ]]);
        assert_eq!(
            ids(&merged),
            vec![
                ("l2", Bucket::Local),
                ("l1", Bucket::Local),
                ("s1", Bucket::Scholar)
            ]
        );
    }

    #[test]
    fn test_length_breaks_score_ties() {
        let merged = merge_hits(vec![vec![
            local("short", "abc", Some(0.5)),
            local("long", "abcdef", Some(0.5)),
            local("unscored-short", "a", None),
            local("unscored-long", "abcd", None),
        ]]);
        assert_eq!(
            merged.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(),
            vec!["long", "short", "unscored-long", "unscored-short"]
        );
    }

    #[test]
    fn test_length_counts_chars_not_bytes() {
        // 4 chars / 8 bytes vs 5 chars / 5 bytes
        let merged = merge_hits(vec![vec![
            local("multibyte", "éééé", None),
            local("ascii", "abcde", None),
        ]]);
        assert_eq!(merged[0].id, "ascii");
    }

    #[test]
    fn test_output_is_unique_and_ordered() {
        let lists: Vec<Vec<PassageHit>> = (0..6)
            .map(|v| {
                (0..5)
                    .map(|i| {
                        let score = ((i * 7 + v * 3) % 11) as f32 / 10.0;
                        if i % 2 == 0 {
                            local(&format!("d{i}"), "text", Some(score))
                        } else {
                            scholar(&format!("d{i}"), "text", Some(score))
                        }
                    })
                    .collect()
            })
            .collect();

        let merged = merge_hits(lists);
        let keys: HashSet<(&str, Bucket)> = merged.iter().map(|h| h.key()).collect();
        assert_eq!(keys.len(), merged.len());

        for pair in merged.windows(2) {
            assert_ne!(rank_order(&pair[0], &pair[1]), Ordering::Greater);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(merge_hits(Vec::<Vec<PassageHit>>::new()).is_empty());
    }
}
