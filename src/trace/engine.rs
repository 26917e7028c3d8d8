//! Span correlation.
//!
//! Every `start` opens a span under its [`SpanKey`] and appends a row to the
//! timeline; the matching `stop` closes it. Per key the lifecycle is
//!
//! ```text
//!   absent ──start──▶ open ──stop──▶ closed (removed from the open table)
//! ```
//!
//! A second `start` on a key that is still open replaces the open span
//! (last start wins). The replaced span can no longer be closed; it stays in
//! the timeline as orphaned and shows up in the unclosed report. A `stop`
//! without an open span is ignored.
//!
//! The open table only governs correlation. Rows are a display log: one per
//! `start`, never removed.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use indexmap::IndexMap;

use super::color::ColorAllocator;
use super::event::{Event, Tag, seconds_between};
use super::key::SpanKey;

/// Correlation state of a timeline row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpanState {
    Open,
    Closed { duration: f64 },
    /// Replaced by a later start on the same key; will never close
    Orphaned,
}

/// One timeline row, created by a `start` event.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRow {
    pub line: u64,
    pub transaction_id: String,
    pub message: String,
    pub context: String,
    pub node: String,
    pub device: String,
    /// Timestamp of the start as written in the trace
    pub started_at: String,
    /// Seconds since the first `start` of the stream
    pub start_offset: f64,
    /// Palette index of the owning transaction
    pub color: u8,
    /// Extent in seconds since the first event of the stream
    pub begin: f64,
    pub end: f64,
    pub state: SpanState,
    pub synthetic: bool,
}

impl SpanRow {
    pub fn is_open(&self) -> bool {
        self.state == SpanState::Open
    }

    pub fn duration(&self) -> Option<f64> {
        match self.state {
            SpanState::Closed { duration } => Some(duration),
            _ => None,
        }
    }
}

/// What an event did to the correlation state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correlation {
    Opened { row: usize },
    /// Opened, abandoning the span previously open under the same key
    Replaced { row: usize, orphaned: usize },
    Closed { row: usize, duration: f64 },
    /// `stop` with no open span under its key
    Unmatched,
    /// `info` events only move the clock
    Noted,
}

/// A span abandoned by a later start on the same key.
#[derive(Debug, Clone, PartialEq)]
pub struct OverwrittenSpan {
    pub line: u64,
    pub replaced_by: u64,
    pub key: String,
}

/// A span that was never closed.
#[derive(Debug, Clone, PartialEq)]
pub struct UnclosedSpan {
    pub line: u64,
    pub transaction_id: String,
    pub message: String,
    pub orphaned: bool,
}

/// End-of-stream correlation findings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationSummary {
    pub spans: usize,
    pub closed: usize,
    pub unclosed: Vec<UnclosedSpan>,
    pub overwritten: Vec<OverwrittenSpan>,
    pub unmatched_stops: usize,
}

#[derive(Debug)]
struct OpenSpan {
    row: usize,
    started_at: NaiveDateTime,
}

/// Correlates start/stop events into timeline rows.
#[derive(Debug)]
pub struct CorrelationEngine {
    colors: ColorAllocator,
    begin: Option<NaiveDateTime>,
    first_start: Option<NaiveDateTime>,
    elapsed: f64,
    open: HashMap<SpanKey, OpenSpan>,
    rows: Vec<SpanRow>,
    timelines: IndexMap<String, Vec<usize>>,
    overwritten: Vec<OverwrittenSpan>,
    unmatched_stops: usize,
    last_timestamp: Option<NaiveDateTime>,
}

impl Default for CorrelationEngine {
    fn default() -> Self {
        Self::new(ColorAllocator::default())
    }
}

impl CorrelationEngine {
    pub fn new(colors: ColorAllocator) -> Self {
        Self {
            colors,
            begin: None,
            first_start: None,
            elapsed: 0.0,
            open: HashMap::new(),
            rows: Vec::new(),
            timelines: IndexMap::new(),
            overwritten: Vec::new(),
            unmatched_stops: 0,
            last_timestamp: None,
        }
    }

    /// Apply one (already filtered) event.
    pub fn process(&mut self, event: &Event) -> Correlation {
        self.advance_clock(event.timestamp);

        let outcome = match event.tag {
            Tag::Start => self.open_span(event),
            Tag::Stop => self.close_span(event),
            Tag::Info => Correlation::Noted,
        };

        // Still-open spans reach up to "now"
        for span in self.open.values() {
            self.rows[span.row].end = self.elapsed;
        }

        outcome
    }

    /// Seconds from the first event to the latest one.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Timestamp of the most recently processed event.
    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.last_timestamp
    }

    /// All rows in start order.
    pub fn rows(&self) -> &[SpanRow] {
        &self.rows
    }

    /// Rows of one transaction in start order.
    pub fn timeline<'a>(&'a self, transaction_id: &str) -> impl Iterator<Item = &'a SpanRow> + 'a {
        self.timelines
            .get(transaction_id)
            .into_iter()
            .flatten()
            .map(|idx| &self.rows[*idx])
    }

    /// Transaction ids in first-start order.
    pub fn transactions(&self) -> impl Iterator<Item = &str> {
        self.timelines.keys().map(String::as_str)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn colors(&self) -> &ColorAllocator {
        &self.colors
    }

    /// Findings so far; call after the last event for the final report.
    pub fn summary(&self) -> CorrelationSummary {
        let unclosed = self
            .rows
            .iter()
            .filter(|row| !matches!(row.state, SpanState::Closed { .. }))
            .map(|row| UnclosedSpan {
                line: row.line,
                transaction_id: row.transaction_id.clone(),
                message: row.message.clone(),
                orphaned: row.state == SpanState::Orphaned,
            })
            .collect::<Vec<_>>();

        CorrelationSummary {
            spans: self.rows.len(),
            closed: self.rows.len() - unclosed.len(),
            unclosed,
            overwritten: self.overwritten.clone(),
            unmatched_stops: self.unmatched_stops,
        }
    }

    /// Elapsed never runs backwards, even when the producer logs slightly
    /// out of order.
    fn advance_clock(&mut self, timestamp: NaiveDateTime) {
        let begin = *self.begin.get_or_insert(timestamp);
        self.elapsed = self.elapsed.max(seconds_between(begin, timestamp));
        self.last_timestamp = Some(timestamp);
    }

    fn open_span(&mut self, event: &Event) -> Correlation {
        let first_start = *self.first_start.get_or_insert(event.timestamp);
        let row = self.rows.len();

        self.rows.push(SpanRow {
            line: event.line,
            transaction_id: event.transaction_id.clone(),
            message: event.message.clone(),
            context: event.context.clone(),
            node: event.node.clone(),
            device: event.device.clone(),
            started_at: event.timestamp_text.clone(),
            start_offset: seconds_between(first_start, event.timestamp).max(0.0),
            color: self.colors.index_for(&event.transaction_id),
            begin: self.elapsed,
            end: self.elapsed,
            state: SpanState::Open,
            synthetic: event.synthetic,
        });
        self.timelines
            .entry(event.transaction_id.clone())
            .or_default()
            .push(row);

        let key = SpanKey::of(event);
        let span = OpenSpan {
            row,
            started_at: event.timestamp,
        };
        match self.open.insert(key, span) {
            None => Correlation::Opened { row },
            Some(previous) => {
                let orphaned = previous.row;
                let replaced = &mut self.rows[orphaned];
                replaced.state = SpanState::Orphaned;
                replaced.end = self.elapsed;
                let key = SpanKey::of(event).to_string();
                log::info!(
                    "Line {}: start of {key} replaces the open span from line {}",
                    event.line,
                    self.rows[orphaned].line
                );
                self.overwritten.push(OverwrittenSpan {
                    line: self.rows[orphaned].line,
                    replaced_by: event.line,
                    key,
                });
                Correlation::Replaced { row, orphaned }
            }
        }
    }

    fn close_span(&mut self, event: &Event) -> Correlation {
        let Some(span) = self.open.remove(&SpanKey::of(event)) else {
            log::debug!(
                "Line {}: stop of {} has no open span",
                event.line,
                SpanKey::of(event)
            );
            self.unmatched_stops += 1;
            return Correlation::Unmatched;
        };

        let duration = event
            .duration
            .unwrap_or_else(|| seconds_between(span.started_at, event.timestamp).max(0.0));
        let row = &mut self.rows[span.row];
        row.end = self.elapsed;
        row.state = SpanState::Closed { duration };

        Correlation::Closed {
            row: span.row,
            duration,
        }
    }
}
