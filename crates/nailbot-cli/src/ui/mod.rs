//! # CLI UI Module
//!
//! Consistent styling for nailbot CLI output.
//!
//! - Scannable `[ok]`/`[err]`/`[warn]`/`[info]` prefixes
//! - Works without colors (`NO_COLOR`, `--color never`)
//! - Machine-readable output via `--json`
//!
//! ## Module Structure
//!
//! - `color`: color mode detection and terminal width
//! - `style`: message types, prefixes and value styling
//! - `format`: text truncation and durations
//! - `table`: comfy-table renderers
//! - `progress`: spinner for slow initialization

pub mod color;
pub mod format;
pub mod progress;
pub mod style;
pub mod table;

pub use color::ColorMode;
pub use progress::{Progress, ProgressMode};
pub use style::{MessageType, Style};
