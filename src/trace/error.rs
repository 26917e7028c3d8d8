//! Trace error types.
//!
//! - **`TraceError`** - fatal conditions that abort a run before any event is
//!   correlated (unreadable input, unrecognised schema, bad bounds). Convert
//!   with `.into()` to `anyhow::Error`; `main` downcasts it back for styled
//!   display.
//!
//! - **`RowError`** - a single unusable record. These are collected into the
//!   end-of-stream report and never stop processing.

use std::path::PathBuf;

use super::schema::{Field, Revision};
use crate::styling::{ERROR, ERROR_BOLD, ERROR_EMOJI, HINT, HINT_EMOJI};

/// Fatal trace errors.
///
/// ```ignore
/// return Err(TraceError::UnsupportedColumnCount { width: 12 }.into());
///
/// if let Some(TraceError::EmptyInput { .. }) = err.downcast_ref() {
///     // nothing to show
/// }
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum TraceError {
    /// The input contained no records at all
    #[error("no records in {source_name}")]
    EmptyInput { source_name: String },

    /// Header-less trace with a width matching no known layout
    #[error("unsupported number of columns in progress trace: {width}")]
    UnsupportedColumnCount { width: usize },

    /// Header identifies a producer revision we cannot correlate
    #[error("progress trace version {revision} is not supported")]
    UnsupportedRevision { revision: Revision },

    /// Header lacks a column every revision must have
    #[error("progress trace header has no '{field}' column")]
    MissingField { field: Field },

    /// Input file could not be opened or read
    #[error("cannot read {}: {error}", .path.display())]
    ReadFailed { path: PathBuf, error: String },

    /// Time-range bound that is not an ISO-8601 timestamp
    #[error("invalid timestamp '{value}'")]
    InvalidTimestamp { value: String },

    /// Configuration file exists but cannot be used
    #[error("invalid config {}: {error}", .path.display())]
    InvalidConfig { path: PathBuf, error: String },
}

impl TraceError {
    /// Render the error with emoji, color and a hint where one helps.
    pub fn styled(&self) -> String {
        match self {
            TraceError::EmptyInput { source_name } => {
                format!(
                    "{ERROR_EMOJI} {ERROR}No records in {ERROR_BOLD}{source_name}{ERROR_BOLD:#}{ERROR:#}"
                )
            }

            TraceError::UnsupportedColumnCount { width } => {
                format!(
                    "{ERROR_EMOJI} {ERROR}Unsupported number of columns in progress trace: {ERROR_BOLD}{width}{ERROR_BOLD:#}{ERROR:#}\n\n{HINT_EMOJI} {HINT}Header-less traces must have 17, 18, 19 or 21 columns{HINT:#}"
                )
            }

            TraceError::UnsupportedRevision { revision } => {
                format!(
                    "{ERROR_EMOJI} {ERROR}Progress trace version {ERROR_BOLD}{revision}{ERROR_BOLD:#}{ERROR} is not supported{ERROR:#}\n\n{HINT_EMOJI} {HINT}Traces without an EVENT TYPE column carry no start/stop pairs{HINT:#}"
                )
            }

            TraceError::MissingField { field } => {
                format!(
                    "{ERROR_EMOJI} {ERROR}Progress trace header has no {ERROR_BOLD}{field}{ERROR_BOLD:#}{ERROR} column{ERROR:#}"
                )
            }

            TraceError::ReadFailed { path, error } => {
                format!(
                    "{ERROR_EMOJI} {ERROR}Cannot read {ERROR_BOLD}{}{ERROR_BOLD:#}{ERROR}: {error}{ERROR:#}",
                    path.display()
                )
            }

            TraceError::InvalidTimestamp { value } => {
                format!(
                    "{ERROR_EMOJI} {ERROR}Invalid timestamp {ERROR_BOLD}{value}{ERROR_BOLD:#}{ERROR:#}\n\n{HINT_EMOJI} {HINT}Use ISO-8601, e.g. 2024-01-01T12:00:00.000000{HINT:#}"
                )
            }

            TraceError::InvalidConfig { path, error } => {
                format!(
                    "{ERROR_EMOJI} {ERROR}Invalid config {ERROR_BOLD}{}{ERROR_BOLD:#}{ERROR:#}\n\n{HINT_EMOJI} {HINT}{error}{HINT:#}",
                    path.display()
                )
            }
        }
    }
}

/// Why a single record was skipped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowErrorKind {
    #[error("expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("unparsable CSV: {0}")]
    Csv(String),

    #[error("not valid UTF-8")]
    Encoding,

    #[error("unknown event type '{0}'")]
    Tag(String),

    #[error("invalid timestamp '{0}'")]
    Timestamp(String),

    #[error("invalid duration '{0}'")]
    Duration(String),
}

/// A skipped record and the line it came from.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("line {line}: {kind}")]
pub struct RowError {
    pub line: u64,
    pub kind: RowErrorKind,
}

impl RowError {
    pub fn new(line: u64, kind: RowErrorKind) -> Self {
        Self { line, kind }
    }
}
