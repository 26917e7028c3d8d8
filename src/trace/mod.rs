//! Progress-trace correlation and timeline rendering.
//!
//! A progress trace is a CSV stream of `start`/`stop`/`info` events. This
//! module turns it into one timeline row per span:
//!
//! - [`schema`] resolves column positions once per stream, from a header or
//!   from the row width of header-less traces
//! - [`reader`] yields raw records, either once or by tailing the source
//! - [`lock`] derives "holding transaction lock" spans the trace never
//!   emits as a pair
//! - [`engine`] pairs starts with stops under a [`key::SpanKey`]
//! - [`display`] renders rows and bars scaled to the elapsed total
//!
//! # Usage
//!
//! ```ignore
//! use ptview::trace::{CorrelationEngine, EventFilter, Pipeline, RecordReader, start_stream};
//!
//! let mut reader = RecordReader::batch(std::io::BufReader::new(file));
//! let start = start_stream(&mut reader, "trace.csv", || true)?.unwrap();
//! let mut pipeline = Pipeline::new(start.schema, EventFilter::default(), CorrelationEngine::default());
//! ```

pub mod color;
pub mod display;
pub mod engine;
pub mod error;
pub mod event;
pub mod filter;
pub mod key;
pub mod lock;
pub mod pipeline;
pub mod playback;
pub mod reader;
pub mod report;
pub mod schema;
pub mod tee;

pub use color::ColorAllocator;
pub use display::{RenderOptions, StartLabel, render_timeline};
pub use engine::{CorrelationEngine, SpanRow, SpanState};
pub use error::{RowError, RowErrorKind, TraceError};
pub use event::{Event, Tag};
pub use filter::EventFilter;
pub use pipeline::{Pipeline, StreamStart, start_stream};
pub use playback::{CancelToken, Pacer, Pacing, RefreshPolicy};
pub use reader::{Poll, RawRecord, RecordReader};
pub use report::StreamReport;
pub use schema::{Detection, TraceSchema};
pub use tee::Tee;
