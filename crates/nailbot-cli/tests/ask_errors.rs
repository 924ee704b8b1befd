//! Integration tests for `nailbot ask` failure paths.
//!
//! These run against an empty index directory, so only the paths that fail
//! before any model is loaded are exercised here. Retrieval itself is
//! covered by the nailbot-core tests.

mod common;

use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

use common::nailbot_cmd;

#[test]
fn test_ask_rejects_zero_retrieval_budget() {
    let temp = TempDir::new().expect("create temp dir");

    nailbot_cmd()
        .env("NAILBOT_INDEX_DIR", temp.path())
        .arg("--config")
        .arg(temp.path().join("config.yaml"))
        .args(["ask", "kuku berlubang", "--k-local", "0", "--k-scholar", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Retrieval failed"))
        .stderr(predicate::str::contains("--k-local"));
}

#[test]
fn test_ask_rejects_zero_max_total() {
    let temp = TempDir::new().expect("create temp dir");

    nailbot_cmd()
        .env("NAILBOT_INDEX_DIR", temp.path())
        .arg("--config")
        .arg(temp.path().join("config.yaml"))
        .args(["ask", "kuku berlubang", "--max-total", "0", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_ask_reports_invalid_config() {
    let temp = TempDir::new().expect("create temp dir");
    let config = temp.path().join("config.yaml");
    fs::write(&config, "retrieval: [unclosed").expect("write config");

    nailbot_cmd()
        .arg("--config")
        .arg(&config)
        .args(["ask", "kuku berlubang"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"))
        .stderr(predicate::str::contains("Check your config"));
}

#[test]
fn test_ask_rejects_unknown_device() {
    let temp = TempDir::new().expect("create temp dir");

    nailbot_cmd()
        .arg("--config")
        .arg(temp.path().join("config.yaml"))
        .args(["--device", "tpu", "ask", "kuku"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid --device"));
}
