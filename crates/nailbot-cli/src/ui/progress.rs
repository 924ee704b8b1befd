//! Spinner for the slow first request (model load, collection open).
//!
//! Shown on stderr only for interactive terminals; hidden for `--quiet`,
//! `--json` and redirected output.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Spinner tick characters (Braille-based).
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Progress feedback mode based on output context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Interactive TTY: animated spinner
    Interactive,
    /// Quiet, JSON or non-TTY: nothing
    Hidden,
}

impl ProgressMode {
    pub fn detect(quiet: bool, json: bool) -> Self {
        if quiet || json || !std::io::stderr().is_terminal() {
            Self::Hidden
        } else {
            Self::Interactive
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive)
    }
}

/// An indeterminate spinner.
pub struct Progress {
    bar: ProgressBar,
}

impl Progress {
    pub fn spinner(message: &str, mode: ProgressMode) -> Self {
        if !mode.is_interactive() {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars(SPINNER_CHARS)
            .template("{spinner:.cyan} {msg} ({elapsed})")
        {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Stop and erase the spinner line.
    pub fn finish_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_and_json_hide_progress() {
        assert_eq!(ProgressMode::detect(true, false), ProgressMode::Hidden);
        assert_eq!(ProgressMode::detect(false, true), ProgressMode::Hidden);
    }

    #[test]
    fn test_hidden_spinner_is_inert() {
        let progress = Progress::spinner("Loading", ProgressMode::Hidden);
        progress.set_message("Still loading");
        progress.finish_clear();
    }
}
