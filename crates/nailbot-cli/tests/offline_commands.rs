//! Integration tests for the commands that run without an index or model:
//! `expand`, `labels`, `format` and `explain --no-retrieval/--hits`.

mod common;

use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

use common::{fixture, nailbot_cmd};

// ============================================================================
// expand
// ============================================================================

#[test]
fn test_expand_lists_prompt_and_label_variants() {
    nailbot_cmd()
        .args(["expand", "apa penyebabnya?", "--label", "pitting"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1. apa penyebabnya?"))
        .stdout(predicate::str::contains("apa penyebabnya? kuku"))
        .stdout(predicate::str::contains(
            "apa penyebabnya? | label: pitting | cekungan kuku",
        ));
}

#[test]
fn test_expand_json_respects_max_variants() {
    let output = nailbot_cmd()
        .args(["expand", "kuku berlubang", "--max-variants", "3", "--json"])
        .output()
        .expect("run nailbot");
    assert!(output.status.success());

    let variants: Vec<String> = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(
        variants,
        vec!["kuku berlubang", "kuku berlubang kuku", "kuku berlubang nail"]
    );
}

#[test]
fn test_expand_empty_prompt_uses_seeds() {
    let output = nailbot_cmd()
        .args(["expand", "--json"])
        .output()
        .expect("run nailbot");
    assert!(output.status.success());

    let variants: Vec<String> = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert!(!variants.is_empty());
    assert!(variants.iter().all(|v| !v.trim().is_empty()));
}

#[test]
fn test_expand_unknown_label_warns() {
    nailbot_cmd()
        .args(["expand", "kuku", "--label", "psoriasis"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Unknown label 'psoriasis'"))
        .stdout(predicate::str::contains("label:").not());
}

// ============================================================================
// labels
// ============================================================================

#[test]
fn test_labels_table() {
    nailbot_cmd()
        .arg("labels")
        .assert()
        .success()
        .stdout(predicate::str::contains("LABEL"))
        .stdout(predicate::str::contains("Acral_Lentiginous_Melanoma"))
        .stdout(predicate::str::contains("General terms"));
}

#[test]
fn test_labels_json() {
    let output = nailbot_cmd()
        .args(["labels", "--json"])
        .output()
        .expect("run nailbot");
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let labels = value["labels"].as_array().expect("labels array");
    assert_eq!(labels.len(), 6);
    assert_eq!(labels[0]["label"], "pitting");
    assert!(labels[0]["aliases"].as_array().is_some_and(|a| !a.is_empty()));
    assert!(value["generalTerms"].as_array().is_some());
}

// ============================================================================
// format
// ============================================================================

#[test]
fn test_format_renders_tagged_blocks_and_references() {
    nailbot_cmd()
        .args(["format", "--hits"])
        .arg(fixture("hits.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("[L1] Pitting tampak sebagai cekungan kecil"))
        .stdout(predicate::str::contains("(Sumber: kb/pitting.md)"))
        .stdout(predicate::str::contains("[S1] Nail pitting is the most frequent"))
        .stdout(predicate::str::contains("REFERENCES"))
        .stdout(predicate::str::contains(
            "[S1] [Doe J. Nail pitting in psoriasis. 2020](https://pubmed.ncbi.nlm.nih.gov/1/)",
        ));
}

#[test]
fn test_format_json() {
    let output = nailbot_cmd()
        .args(["format", "--json", "--hits"])
        .arg(fixture("hits.json"))
        .output()
        .expect("run nailbot");
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert!(value["context"]
        .as_str()
        .is_some_and(|c| c.starts_with("=== KONTEN LOKAL ===\n[L1]")));
    assert_eq!(value["references"].as_array().map(|r| r.len()), Some(1));
    assert_eq!(value["localRendered"], 1);
    assert_eq!(value["scholarRendered"], 1);
}

#[test]
fn test_format_empty_hits_prints_sentinel() {
    let temp = TempDir::new().expect("create temp dir");
    let hits = temp.path().join("empty.json");
    fs::write(&hits, "[]").expect("write hits");

    nailbot_cmd()
        .args(["format", "--hits"])
        .arg(&hits)
        .assert()
        .success()
        .stdout(predicate::str::contains("Tidak ada konteks yang relevan."))
        .stdout(predicate::str::contains("REFERENCES").not());
}

#[test]
fn test_format_invalid_hits_file_fails() {
    let temp = TempDir::new().expect("create temp dir");
    let hits = temp.path().join("broken.json");
    fs::write(&hits, "{ not json").expect("write hits");

    nailbot_cmd()
        .args(["format", "--hits"])
        .arg(&hits)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid hits JSON"));
}

#[test]
fn test_format_missing_hits_file_fails() {
    let temp = TempDir::new().expect("create temp dir");

    nailbot_cmd()
        .args(["format", "--hits"])
        .arg(temp.path().join("nope.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read hits"));
}

// ============================================================================
// explain
// ============================================================================

#[test]
fn test_explain_without_retrieval_uses_template() {
    nailbot_cmd()
        .args([
            "explain",
            "--label",
            "pitting",
            "--confidence",
            "0.912",
            "--prompt",
            "kenapa kuku saya berlubang?",
            "--no-retrieval",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Model memperkirakan *pitting* (keyakinan 91.2%)."))
        .stdout(predicate::str::contains("Pertanyaan Anda telah dicatat."))
        .stdout(predicate::str::contains(
            "Informasi ini bersifat edukasi dan bukan diagnosis medis.",
        ))
        .stdout(predicate::str::contains("Tidak ada konteks yang relevan."));
}

#[test]
fn test_explain_with_hits_lists_sources() {
    nailbot_cmd()
        .args(["explain", "--label", "pitting", "--confidence", "0.9", "--hits"])
        .arg(fixture("hits.json"))
        .arg("--probs")
        .arg(fixture("probs.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("- [S1] [Doe J. Nail pitting in psoriasis. 2020]"))
        .stdout(predicate::str::contains("[L1] Pitting tampak"));
}

#[test]
fn test_explain_json_reports_intent_and_domain() {
    let output = nailbot_cmd()
        .args([
            "explain",
            "--label",
            "pitting",
            "--confidence",
            "0.8",
            "--prompt",
            "bagaimana cara merawat kuku?",
            "--no-retrieval",
            "--json",
        ])
        .output()
        .expect("run nailbot");
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(value["label"], "pitting");
    assert_eq!(value["intent"], "care");
    assert_eq!(value["onDomain"], true);
    assert!(value["explanation"].as_str().is_some_and(|e| e.contains("pitting")));
}

#[test]
fn test_explain_rejects_out_of_range_confidence() {
    nailbot_cmd()
        .args(["explain", "--label", "pitting", "--confidence", "1.5", "--no-retrieval"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--confidence must be within [0, 1]"));
}

#[test]
fn test_explain_hits_conflicts_with_no_retrieval() {
    nailbot_cmd()
        .args(["explain", "--label", "pitting", "--confidence", "0.5", "--no-retrieval", "--hits"])
        .arg(fixture("hits.json"))
        .assert()
        .failure();
}
