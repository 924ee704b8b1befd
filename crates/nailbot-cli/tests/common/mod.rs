//! Shared test utilities for nailbot-cli integration tests.

use std::path::PathBuf;

use assert_cmd::Command;

/// Get a Command for the nailbot binary.
///
/// Environment overrides are cleared so a developer's own `NAILBOT_*`
/// settings never leak into assertions.
///
/// # Panics
///
/// Panics if the nailbot binary cannot be found. This should not happen
/// in a properly configured test environment.
#[allow(deprecated)]
pub fn nailbot_cmd() -> Command {
    let mut cmd = Command::cargo_bin("nailbot").expect("nailbot binary should exist");
    for key in [
        "NAILBOT_CONFIG",
        "NAILBOT_DEVICE",
        "NAILBOT_INDEX_DIR",
        "NAILBOT_COLL_LOCAL",
        "NAILBOT_COLL_SCHOLAR",
        "NAILBOT_EMB_MODEL",
        "NAILBOT_VERBOSE",
        "NAILBOT_QUIET",
        "RUST_LOG",
    ] {
        cmd.env_remove(key);
    }
    cmd.env("NAILBOT_COLOR", "never");
    cmd
}

/// Path to a file under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}
