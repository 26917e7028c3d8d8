//! Styling for terminal output.
//!
//! This module uses the anstyle ecosystem:
//! - anstream for auto-detecting color support
//! - anstyle for composable styling
//! - Semantic style constants for the timeline and diagnostics

mod constants;
mod line;

use anstyle::{AnsiColor, Color, Style};

pub use constants::*;
pub use line::{StyledLine, StyledString, truncate_visible};

/// Auto-detecting println that respects NO_COLOR, CLICOLOR_FORCE, and terminal capabilities
pub use anstream::println;

/// Auto-detecting eprintln that respects NO_COLOR, CLICOLOR_FORCE, and terminal capabilities
pub use anstream::eprintln;

/// Error style (red) - use as `{ERROR}text{ERROR:#}`
pub const ERROR: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));

/// Error style with bold - use as `{ERROR_BOLD}text{ERROR_BOLD:#}`
pub const ERROR_BOLD: Style = ERROR.bold();

/// Hint style (dimmed) - use as `{HINT}text{HINT:#}`
pub const HINT: Style = Style::new().dimmed();

/// Table header
pub const HEADER: Style = Style::new().bold();

/// Style of a transaction's palette entry.
pub fn palette(index: u8) -> Style {
    Style::new().fg_color(Some(Color::Ansi256(anstyle::Ansi256Color(index))))
}
