//! Record-to-timeline processing chain.
//!
//! ```text
//! RawRecord → Event → source filter → lock synthesis → message filter → engine
//! ```
//!
//! A [`Pipeline`] owns every stage and all their state; it is fed one record
//! at a time and never blocks, so batch, real-time and follow runs share it.

use std::io::BufRead;
use std::path::PathBuf;

use chrono::NaiveDateTime;

use super::engine::CorrelationEngine;
use super::error::{RowError, TraceError};
use super::event::Event;
use super::filter::EventFilter;
use super::lock::LockSynthesizer;
use super::reader::{Poll, RawRecord, RecordReader};
use super::report::StreamReport;
use super::schema::TraceSchema;

/// Schema and leftovers from the head of a stream.
#[derive(Debug)]
pub struct StreamStart {
    pub schema: TraceSchema,
    /// First record when it is data rather than a header
    pub first: Option<RawRecord>,
    /// Unsplittable lines seen before the first record
    pub skipped: Vec<RowError>,
    /// Every byte consumed so far, as read
    pub head: Vec<u8>,
    /// The source had to be waited on before the first record arrived
    pub waited: bool,
}

/// Read up to the first record and resolve the schema from it.
///
/// `idle` runs whenever a tailed source has no data yet; returning `false`
/// abandons the stream and yields `Ok(None)`.
pub fn start_stream<R: BufRead>(
    reader: &mut RecordReader<R>,
    source_name: &str,
    mut idle: impl FnMut() -> bool,
) -> Result<Option<StreamStart>, TraceError> {
    let mut skipped = Vec::new();
    let mut head = Vec::new();
    let mut waited = false;
    loop {
        let poll = reader.poll().map_err(|e| TraceError::ReadFailed {
            path: PathBuf::from(source_name),
            error: e.to_string(),
        })?;
        match poll {
            Poll::Record(record) => {
                let schema = TraceSchema::resolve(&record.cells())?;
                log::debug!(
                    "Resolved {} schema ({} columns) from line {}",
                    schema.revision(),
                    schema.width(),
                    record.line
                );
                head.extend_from_slice(record.raw.as_bytes());
                let first = (!schema.consumed_header()).then_some(record);
                return Ok(Some(StreamStart {
                    schema,
                    first,
                    skipped,
                    head,
                    waited,
                }));
            }
            Poll::Malformed { raw, error } => {
                head.extend_from_slice(&raw);
                skipped.push(error);
            }
            Poll::Idle => {
                waited = true;
                if !idle() {
                    return Ok(None);
                }
            }
            Poll::End => {
                return Err(TraceError::EmptyInput {
                    source_name: source_name.to_string(),
                });
            }
        }
    }
}

pub struct Pipeline {
    schema: TraceSchema,
    filter: EventFilter,
    locks: LockSynthesizer,
    engine: CorrelationEngine,
    malformed: Vec<RowError>,
    records: u64,
    events: u64,
    staged: Vec<Event>,
}

impl Pipeline {
    pub fn new(schema: TraceSchema, filter: EventFilter, engine: CorrelationEngine) -> Self {
        Self {
            schema,
            filter,
            locks: LockSynthesizer::new(),
            engine,
            malformed: Vec::new(),
            records: 0,
            events: 0,
            staged: Vec::new(),
        }
    }

    /// Process one data record.
    ///
    /// Returns the event timestamp when the record passed the source filter.
    pub fn feed(&mut self, record: &RawRecord) -> Option<NaiveDateTime> {
        let event = self.prepare(record)?;
        let timestamp = event.timestamp;
        self.apply(event);
        Some(timestamp)
    }

    /// Parse `record` and apply the source filter, without correlating.
    ///
    /// Lets the caller pace on the event before it takes effect.
    pub fn prepare(&mut self, record: &RawRecord) -> Option<Event> {
        self.records += 1;

        let event = match Event::from_record(&self.schema, record) {
            Ok(event) => event?,
            Err(error) => {
                self.reject(error);
                return None;
            }
        };
        self.filter.admits_source(&event).then_some(event)
    }

    /// Run a prepared event through lock synthesis and into the engine.
    pub fn apply(&mut self, event: Event) {
        self.locks.process(event, &mut self.staged);
        for event in self.staged.drain(..) {
            if self.filter.admits_message(&event) {
                self.engine.process(&event);
                self.events += 1;
            }
        }
    }

    /// Record a row the reader could not split.
    pub fn reject(&mut self, error: RowError) {
        log::info!("Skipping {error}");
        self.malformed.push(error);
    }

    pub fn schema(&self) -> &TraceSchema {
        &self.schema
    }

    pub fn engine(&self) -> &CorrelationEngine {
        &self.engine
    }

    /// Close out lock bookkeeping and collect the report.
    pub fn finish(&mut self) -> StreamReport {
        StreamReport {
            records: self.records,
            events: self.events,
            malformed: self.malformed.clone(),
            correlation: self.engine.summary(),
            locks: self.locks.finish(),
        }
    }
}
