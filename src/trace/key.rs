//! Correlation keys pairing `start` events with their `stop`.

use std::fmt;

use super::event::Event;

/// Composite key over the identifying fields of an event.
///
/// Equality and hashing are field-wise, so `("ab", "c")` and `("a", "bc")`
/// never collide the way naive concatenation would. Empty fields (columns
/// the revision lacks) are kept as empty components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanKey {
    pub session_id: String,
    pub transaction_id: String,
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: String,
    pub service: String,
    pub node: String,
    pub device: String,
    pub message: String,
}

impl SpanKey {
    /// Key of `event`.
    ///
    /// Datastore, context and annotation are left out: a `stop` annotates
    /// its outcome, which its `start` cannot know.
    pub fn of(event: &Event) -> Self {
        Self {
            session_id: event.session_id.clone(),
            transaction_id: event.transaction_id.clone(),
            trace_id: event.trace_id.clone(),
            span_id: event.span_id.clone(),
            parent_span_id: event.parent_span_id.clone(),
            service: event.service.clone(),
            node: event.node.clone(),
            device: event.device.clone(),
            message: event.message.clone(),
        }
    }
}

impl fmt::Display for SpanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.message, self.transaction_id)?;
        if !self.device.is_empty() {
            write!(f, " device={}", self.device)?;
        }
        if !self.span_id.is_empty() {
            write!(f, " span={}", self.span_id)?;
        }
        Ok(())
    }
}
