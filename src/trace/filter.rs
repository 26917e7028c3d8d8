//! Event selection applied before correlation.
//!
//! Structural predicates (datastore, transaction, time range) run on trace
//! events before lock synthesis, so locks of excluded transactions are never
//! tracked. The message allow-list runs afterwards, on real and synthetic
//! events alike, so a synthesized span can be selected by its own name.

use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDateTime;

use super::error::TraceError;
use super::event::{Event, parse_timestamp};

/// Datastore of operational (read-only, stats) transactions.
const OPERATIONAL: &str = "operational";

/// Transaction id the engine uses for bookkeeping outside any transaction.
const NO_TRANSACTION: &str = "-1";

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub include_operational: bool,
    pub transactions: Option<HashSet<String>>,
    pub messages: Option<HashSet<String>>,
    pub begin: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl EventFilter {
    /// Predicates on where an event comes from.
    pub fn admits_source(&self, event: &Event) -> bool {
        if !self.include_operational && event.datastore == OPERATIONAL {
            return false;
        }
        if event.transaction_id == NO_TRANSACTION {
            return false;
        }
        if let Some(tids) = &self.transactions
            && !tids.contains(&event.transaction_id)
        {
            return false;
        }
        if self.begin.is_some_and(|begin| event.timestamp < begin) {
            return false;
        }
        if self.end.is_some_and(|end| event.timestamp > end) {
            return false;
        }
        true
    }

    /// Message allow-list.
    pub fn admits_message(&self, event: &Event) -> bool {
        self.messages
            .as_ref()
            .is_none_or(|messages| messages.contains(&event.message))
    }

    pub fn admits(&self, event: &Event) -> bool {
        self.admits_source(event) && self.admits_message(event)
    }
}

/// Split a comma-separated id list, ignoring blanks.
pub fn parse_id_list(list: &str) -> HashSet<String> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse an inclusive time-range bound.
pub fn parse_bound(value: &str) -> Result<NaiveDateTime, TraceError> {
    parse_timestamp(value).ok_or_else(|| TraceError::InvalidTimestamp {
        value: value.to_string(),
    })
}

/// Parse a message allow-list: one message per line, `#` and `-` lines
/// excluded.
pub fn parse_message_list(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(['#', '-']))
        .map(str::to_string)
        .collect()
}

/// Read a message allow-list file.
pub fn read_message_list(path: &Path) -> Result<HashSet<String>, TraceError> {
    let content = std::fs::read_to_string(path).map_err(|e| TraceError::ReadFailed {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    let messages = parse_message_list(&content);
    log::debug!("Loaded {} messages from {}", messages.len(), path.display());
    Ok(messages)
}
