//! Emojis and message formatters for diagnostics.
//!
//! Use `cformat!` with HTML-like tags for user-facing messages:
//!
//! ```rust,ignore
//! use color_print::cformat;
//!
//! cformat!("<yellow>Skipped line <bold>{line}</></>")
//! ```
//!
//! Semantic mapping: errors `<red>`, warnings `<yellow>`, hints `<dim>`,
//! success `<green>`.

use color_print::cformat;

/// Error emoji: `cformat!("{ERROR_EMOJI} <red>message</>")`
pub const ERROR_EMOJI: &str = "❌";

/// Warning emoji: `cformat!("{WARNING_EMOJI} <yellow>message</>")`
pub const WARNING_EMOJI: &str = "🟡";

/// Hint emoji: `cformat!("{HINT_EMOJI} <dim>message</>")`
pub const HINT_EMOJI: &str = "💡";

/// Success emoji: `cformat!("{SUCCESS_EMOJI} <green>message</>")`
pub const SUCCESS_EMOJI: &str = "✅";

/// Info emoji, for neutral status
pub const INFO_EMOJI: &str = "⚪";

/// Format an error message with emoji and red styling
pub fn error_message(content: impl AsRef<str>) -> String {
    cformat!("{ERROR_EMOJI} <red>{}</>", content.as_ref())
}

/// Format a warning message with emoji and yellow styling
pub fn warning_message(content: impl AsRef<str>) -> String {
    cformat!("{WARNING_EMOJI} <yellow>{}</>", content.as_ref())
}

/// Format a success message with emoji and green styling
pub fn success_message(content: impl AsRef<str>) -> String {
    cformat!("{SUCCESS_EMOJI} <green>{}</>", content.as_ref())
}

/// Format an info message with emoji (no color)
pub fn info_message(content: impl AsRef<str>) -> String {
    cformat!("{INFO_EMOJI} {}", content.as_ref())
}
