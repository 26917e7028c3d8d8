//! Progress trace schema resolution.
//!
//! The column set of a progress trace changed between producer revisions.
//! Newer traces start with a header row naming every column, and the
//! presence of a few probe columns tells which revision wrote the file.
//! Older traces have no header at all; they are recognised by their width
//! alone, and each known width maps to a fixed [`Layout`].
//!
//! A [`TraceSchema`] is resolved once from the first record of a stream and
//! never changes afterwards.

use serde::Serialize;
use std::str::FromStr;
use strum::{EnumCount, IntoEnumIterator};

use super::error::TraceError;

/// Logical trace columns, named as they appear in header rows.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::AsRefStr,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::EnumCount,
)]
pub enum Field {
    #[strum(serialize = "EVENT TYPE")]
    EventType,
    #[strum(serialize = "TIMESTAMP")]
    Timestamp,
    #[strum(serialize = "DURATION")]
    Duration,
    #[strum(serialize = "SESSION ID")]
    SessionId,
    #[strum(serialize = "TRANSACTION ID")]
    TransactionId,
    #[strum(serialize = "DATASTORE")]
    Datastore,
    #[strum(serialize = "CONTEXT")]
    Context,
    #[strum(serialize = "TRACE ID")]
    TraceId,
    #[strum(serialize = "SPAN ID")]
    SpanId,
    #[strum(serialize = "PARENT SPAN ID")]
    ParentSpanId,
    #[strum(serialize = "SUBSYSTEM")]
    Subsystem,
    #[strum(serialize = "PHASE")]
    Phase,
    #[strum(serialize = "SERVICE")]
    Service,
    #[strum(serialize = "SERVICE PHASE")]
    ServicePhase,
    #[strum(serialize = "COMMIT QUEUE ID")]
    CommitQueueId,
    #[strum(serialize = "NODE")]
    Node,
    #[strum(serialize = "DEVICE")]
    Device,
    #[strum(serialize = "DEVICE PHASE")]
    DevicePhase,
    #[strum(serialize = "PACKAGE")]
    Package,
    #[strum(serialize = "MESSAGE")]
    Message,
    #[strum(serialize = "ANNOTATION")]
    Annotation,
    #[strum(serialize = "ATTRIBUTE NAME")]
    AttributeName,
    #[strum(serialize = "ATTRIBUTE VALUE")]
    AttributeValue,
}

/// Columns without which no revision can be correlated.
const REQUIRED: [Field; 4] = [
    Field::EventType,
    Field::Timestamp,
    Field::TransactionId,
    Field::Message,
];

/// Producer revision, as far as the column set reveals it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, strum::Display)]
pub enum Revision {
    #[strum(serialize = "-5.3")]
    #[serde(rename = "-5.3")]
    Pre5_4,
    #[strum(serialize = "5.4-5.6")]
    #[serde(rename = "5.4-5.6")]
    V5_4,
    #[strum(serialize = "5.7-6.0")]
    #[serde(rename = "5.7-6.0")]
    V5_7,
    #[strum(serialize = "6.1-")]
    #[serde(rename = "6.1-")]
    V6_1,
}

/// Optional features a revision provides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Stop events carry a DURATION and every row an EVENT TYPE
    pub duration: bool,
    /// Rows carry a TRACE ID
    pub traces: bool,
    /// Rows carry SPAN ID / PARENT SPAN ID
    pub spans: bool,
}

impl Capabilities {
    fn revision(self) -> Revision {
        if self.spans {
            Revision::V6_1
        } else if self.traces {
            Revision::V5_7
        } else if self.duration {
            Revision::V5_4
        } else {
            Revision::Pre5_4
        }
    }
}

/// Fixed column layouts of header-less traces, keyed by width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::EnumIter)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Layout {
    /// 17 columns: span-aware, without phase/queue/package detail
    Compact,
    /// 18 columns: no trace or span identifiers
    Classic,
    /// 19 columns: classic plus TRACE ID
    Traced,
    /// 21 columns: trace, span and parent span identifiers up front
    Spanned,
}

const CLASSIC: &[Field] = &[
    Field::EventType,
    Field::Timestamp,
    Field::Duration,
    Field::SessionId,
    Field::TransactionId,
    Field::Datastore,
    Field::Context,
    Field::Subsystem,
    Field::Phase,
    Field::Service,
    Field::ServicePhase,
    Field::CommitQueueId,
    Field::Node,
    Field::Device,
    Field::DevicePhase,
    Field::Package,
    Field::Message,
    Field::Annotation,
];

const TRACED: &[Field] = &[
    Field::EventType,
    Field::Timestamp,
    Field::Duration,
    Field::SessionId,
    Field::TransactionId,
    Field::Datastore,
    Field::Context,
    Field::TraceId,
    Field::Subsystem,
    Field::Phase,
    Field::Service,
    Field::ServicePhase,
    Field::CommitQueueId,
    Field::Node,
    Field::Device,
    Field::DevicePhase,
    Field::Package,
    Field::Message,
    Field::Annotation,
];

const SPANNED: &[Field] = &[
    Field::EventType,
    Field::Timestamp,
    Field::Duration,
    Field::TraceId,
    Field::SpanId,
    Field::ParentSpanId,
    Field::SessionId,
    Field::TransactionId,
    Field::Datastore,
    Field::Context,
    Field::Subsystem,
    Field::Phase,
    Field::Service,
    Field::ServicePhase,
    Field::CommitQueueId,
    Field::Node,
    Field::Device,
    Field::DevicePhase,
    Field::Package,
    Field::Message,
    Field::Annotation,
];

const COMPACT: &[Field] = &[
    Field::EventType,
    Field::Timestamp,
    Field::Duration,
    Field::TraceId,
    Field::SpanId,
    Field::ParentSpanId,
    Field::SessionId,
    Field::TransactionId,
    Field::Datastore,
    Field::Context,
    Field::Subsystem,
    Field::Phase,
    Field::Service,
    Field::Node,
    Field::Device,
    Field::Message,
    Field::Annotation,
];

impl Layout {
    /// Pick the layout for a header-less record of `width` columns.
    pub fn from_width(width: usize) -> Option<Self> {
        Layout::iter().find(|layout| layout.width() == width)
    }

    /// Columns in positional order.
    pub fn columns(self) -> &'static [Field] {
        match self {
            Layout::Compact => COMPACT,
            Layout::Classic => CLASSIC,
            Layout::Traced => TRACED,
            Layout::Spanned => SPANNED,
        }
    }

    pub fn width(self) -> usize {
        self.columns().len()
    }

    fn capabilities(self) -> Capabilities {
        let has = |field| self.columns().contains(&field);
        Capabilities {
            duration: true,
            traces: has(Field::TraceId),
            spans: has(Field::SpanId),
        }
    }
}

/// Where the column mapping came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "layout", rename_all = "kebab-case")]
pub enum SchemaSource {
    /// The first record named the columns (and is not data)
    Header,
    /// The first record is data; its width selected the layout
    Positional(Layout),
}

/// What the first record says about a trace, before any support decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub revision: Revision,
    pub capabilities: Capabilities,
    pub source: SchemaSource,
    pub width: usize,
}

/// Immutable name-to-column mapping for one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSchema {
    detection: Detection,
    columns: [Option<usize>; Field::COUNT],
}

impl TraceSchema {
    /// Inspect the first record of a stream.
    ///
    /// Only an unrecognised header-less width is an error here; a header of
    /// an old revision is still reported so that `--detect` can name it.
    pub fn detect(first: &[&str]) -> Result<Detection, TraceError> {
        if is_header(first) {
            let names: Vec<Field> = header_fields(first).filter_map(|(_, f)| f).collect();
            let has = |field| names.contains(&field);
            let capabilities = Capabilities {
                duration: has(Field::EventType),
                traces: has(Field::TraceId),
                spans: has(Field::SpanId),
            };
            return Ok(Detection {
                revision: capabilities.revision(),
                capabilities,
                source: SchemaSource::Header,
                width: first.len(),
            });
        }

        let layout = Layout::from_width(first.len())
            .ok_or(TraceError::UnsupportedColumnCount { width: first.len() })?;
        let capabilities = layout.capabilities();
        Ok(Detection {
            revision: capabilities.revision(),
            capabilities,
            source: SchemaSource::Positional(layout),
            width: layout.width(),
        })
    }

    /// Resolve the schema a stream will be read with.
    pub fn resolve(first: &[&str]) -> Result<Self, TraceError> {
        let detection = Self::detect(first)?;
        if detection.revision == Revision::Pre5_4 {
            return Err(TraceError::UnsupportedRevision {
                revision: detection.revision,
            });
        }

        let mut columns = [None; Field::COUNT];
        match detection.source {
            SchemaSource::Header => {
                for (idx, field) in header_fields(first) {
                    // First occurrence wins for duplicated header cells
                    if let Some(field) = field
                        && columns[field as usize].is_none()
                    {
                        columns[field as usize] = Some(idx);
                    }
                }
            }
            SchemaSource::Positional(layout) => {
                for (idx, field) in layout.columns().iter().enumerate() {
                    columns[*field as usize] = Some(idx);
                }
            }
        }

        if let Some(field) = REQUIRED.iter().find(|f| columns[**f as usize].is_none()) {
            return Err(TraceError::MissingField { field: *field });
        }

        Ok(Self { detection, columns })
    }

    /// Column index of `field`, if this revision has it.
    pub fn index(&self, field: Field) -> Option<usize> {
        self.columns[field as usize]
    }

    pub fn has(&self, field: Field) -> bool {
        self.index(field).is_some()
    }

    /// Value of `field` in `record`; absent columns read as empty.
    pub fn get<'r>(&self, record: &'r csv::StringRecord, field: Field) -> &'r str {
        self.index(field)
            .and_then(|idx| record.get(idx))
            .unwrap_or("")
    }

    /// Number of columns every record of the stream must have.
    pub fn width(&self) -> usize {
        self.detection.width
    }

    pub fn revision(&self) -> Revision {
        self.detection.revision
    }

    pub fn capabilities(&self) -> Capabilities {
        self.detection.capabilities
    }

    pub fn source(&self) -> SchemaSource {
        self.detection.source
    }

    /// Whether the record used for resolution was a header (not data).
    pub fn consumed_header(&self) -> bool {
        self.detection.source == SchemaSource::Header
    }
}

fn is_header(record: &[&str]) -> bool {
    record.iter().any(|cell| clean_cell(cell) == Field::Timestamp.as_ref())
}

fn header_fields<'a>(record: &'a [&'a str]) -> impl Iterator<Item = (usize, Option<Field>)> + 'a {
    record
        .iter()
        .enumerate()
        .map(|(idx, cell)| (idx, Field::from_str(clean_cell(cell)).ok()))
}

/// Header cells may carry a UTF-8 byte order mark or stray padding.
fn clean_cell(cell: &str) -> &str {
    cell.trim_start_matches('\u{feff}').trim()
}
