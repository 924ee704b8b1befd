//! Message styling for CLI output.
//!
//! | Prefix | Meaning | Color |
//! |--------|---------|-------|
//! | `[ok]` | Success | Green |
//! | `[err]` | Error | Red |
//! | `[warn]` | Warning | Yellow |
//! | `[info]` | Information | Blue |
//! | `[hint]` | Suggestion | Cyan |

use owo_colors::OwoColorize;

use nailbot_core::Bucket;

use super::color::ColorMode;

/// Message severity/type for CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Ok,
    Err,
    Warn,
    Info,
    Hint,
}

impl MessageType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Ok => "[ok]",
            Self::Err => "[err]",
            Self::Warn => "[warn]",
            Self::Info => "[info]",
            Self::Hint => "[hint]",
        }
    }
}

/// Styling for everything the CLI prints.
#[derive(Debug, Clone)]
pub struct Style {
    color_mode: ColorMode,
}

impl Style {
    pub fn new(color_mode: ColorMode) -> Self {
        Self { color_mode }
    }

    pub fn colors_enabled(&self) -> bool {
        self.color_mode.is_enabled()
    }

    /// A message with a type prefix, e.g. `[ok] Done`.
    pub fn message(&self, msg_type: MessageType, text: &str) -> String {
        let prefix = msg_type.prefix();
        if !self.colors_enabled() {
            return format!("{} {}", prefix, text);
        }
        let colored = match msg_type {
            MessageType::Ok => prefix.green().to_string(),
            MessageType::Err => prefix.red().to_string(),
            MessageType::Warn => prefix.yellow().to_string(),
            MessageType::Info => prefix.blue().to_string(),
            MessageType::Hint => prefix.cyan().to_string(),
        };
        format!("{} {}", colored, text)
    }

    /// An error followed by indented cause and hint lines.
    pub fn error_with_context(&self, msg: &str, cause: Option<&str>, hint: Option<&str>) -> String {
        let mut output = self.message(MessageType::Err, msg);
        if let Some(cause) = cause {
            output.push_str(&format!("\n      Cause: {}", cause));
        }
        if let Some(hint) = hint {
            output.push_str(&format!("\n      Hint: {}", hint));
        }
        output
    }

    /// Section header, bold when colored.
    pub fn section(&self, title: &str) -> String {
        if self.colors_enabled() {
            title.bold().to_string()
        } else {
            title.to_string()
        }
    }

    pub fn key_value(&self, key: &str, value: &str) -> String {
        if self.colors_enabled() {
            format!("{}: {}", key.dimmed(), value)
        } else {
            format!("{}: {}", key, value)
        }
    }

    /// Bucket name, green for Local and magenta for Scholar.
    pub fn bucket(&self, bucket: Bucket) -> String {
        let name = bucket.as_str();
        if !self.colors_enabled() {
            return name.to_string();
        }
        match bucket {
            Bucket::Local => name.green().to_string(),
            Bucket::Scholar => name.magenta().to_string(),
        }
    }

    /// Passage source (path or URL), cyan when colored.
    pub fn source(&self, source: &str) -> String {
        if self.colors_enabled() {
            source.cyan().to_string()
        } else {
            source.to_string()
        }
    }

    /// Distance score; lower is closer. Missing scores render as `-`.
    ///
    /// - <= 0.3: green
    /// - <= 0.6: yellow
    /// - otherwise red
    pub fn distance(&self, value: Option<f32>) -> String {
        let Some(value) = value else {
            return "-".to_string();
        };
        let formatted = format!("{:.3}", value);
        if !self.colors_enabled() {
            return formatted;
        }
        if value <= 0.3 {
            formatted.green().to_string()
        } else if value <= 0.6 {
            formatted.yellow().to_string()
        } else {
            formatted.red().to_string()
        }
    }
}
