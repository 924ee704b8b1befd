//! # nailbot CLI
//!
//! Command-line access to the `nailbot-core` retrieval pipeline: query
//! expansion, dual-collection retrieval, context formatting and the
//! explanation templates. Run `nailbot --help` for usage information.

mod cli;
pub mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
