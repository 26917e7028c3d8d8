//! Normalized trace events.

use chrono::{DateTime, NaiveDateTime};

use super::error::{RowError, RowErrorKind};
use super::reader::RawRecord;
use super::schema::{Field, TraceSchema};

/// Lifecycle tag of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Tag {
    Start,
    Stop,
    Info,
}

/// One parsed trace row.
///
/// Identifier fields are opaque; revisions that lack a column leave it empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Source line number (1-based); synthetic events reuse their trigger's
    pub line: u64,
    pub tag: Tag,
    pub timestamp: NaiveDateTime,
    /// Timestamp exactly as written in the trace
    pub timestamp_text: String,
    /// Seconds, present on `stop` rows of revisions that record it
    pub duration: Option<f64>,
    pub session_id: String,
    pub transaction_id: String,
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: String,
    pub datastore: String,
    pub context: String,
    pub service: String,
    pub node: String,
    pub device: String,
    pub message: String,
    pub annotation: String,
    /// Derived by the lock synthesizer rather than read from the trace
    pub synthetic: bool,
}

impl Event {
    /// Parse `record` under `schema`.
    ///
    /// Returns `Ok(None)` for rows that are not lifecycle events (attribute
    /// continuation rows with an empty EVENT TYPE).
    pub fn from_record(schema: &TraceSchema, record: &RawRecord) -> Result<Option<Self>, RowError> {
        let fields = &record.fields;
        let row_error = |kind| RowError::new(record.line, kind);

        if fields.len() != schema.width() {
            return Err(row_error(RowErrorKind::ColumnCount {
                expected: schema.width(),
                found: fields.len(),
            }));
        }

        let get = |field| schema.get(fields, field);

        let tag_text = get(Field::EventType);
        if tag_text.is_empty() {
            return Ok(None);
        }
        let tag: Tag = tag_text
            .parse()
            .map_err(|_| row_error(RowErrorKind::Tag(tag_text.to_string())))?;

        let timestamp_text = get(Field::Timestamp);
        let timestamp = parse_timestamp(timestamp_text)
            .ok_or_else(|| row_error(RowErrorKind::Timestamp(timestamp_text.to_string())))?;

        let duration = parse_duration(get(Field::Duration))
            .map_err(|raw| row_error(RowErrorKind::Duration(raw)))?;

        Ok(Some(Self {
            line: record.line,
            tag,
            timestamp,
            timestamp_text: timestamp_text.to_string(),
            duration,
            session_id: get(Field::SessionId).to_string(),
            transaction_id: get(Field::TransactionId).to_string(),
            trace_id: get(Field::TraceId).to_string(),
            span_id: get(Field::SpanId).to_string(),
            parent_span_id: get(Field::ParentSpanId).to_string(),
            datastore: get(Field::Datastore).to_string(),
            context: get(Field::Context).to_string(),
            service: get(Field::Service).to_string(),
            node: get(Field::Node).to_string(),
            device: get(Field::Device).to_string(),
            message: get(Field::Message).to_string(),
            annotation: get(Field::Annotation).to_string(),
            synthetic: false,
        }))
    }

    pub fn is_start(&self) -> bool {
        self.tag == Tag::Start
    }

    pub fn is_stop(&self) -> bool {
        self.tag == Tag::Stop
    }
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts an optional fractional part and an optional UTC offset (`Z` or
/// `±hh:mm`); offset-bearing timestamps are normalized to UTC.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

/// Seconds between two instants, at microsecond resolution.
pub fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

fn parse_duration(text: &str) -> Result<Option<f64>, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    match text.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok(Some(secs)),
        _ => Err(text.to_string()),
    }
}
