//! Synthesized "holding transaction lock" spans.
//!
//! The trace does not emit the lock-held interval as a start/stop pair.
//! Acquisition shows up as the `stop` of "grabbing transaction lock" and
//! release as an `info` "releasing transaction lock". This stage watches for
//! both and injects a synthetic start/stop pair right after each trigger.

use chrono::NaiveDateTime;
use indexmap::IndexMap;

use super::event::{Event, Tag, seconds_between};

/// Message of the synthesized span.
pub const HOLDING_LOCK: &str = "holding transaction lock";

/// Older producers say "grabbing", newer ones "taking".
const ACQUIRE_MESSAGES: [&str; 2] = ["grabbing transaction lock", "taking transaction lock"];

const RELEASE_MESSAGE: &str = "releasing transaction lock";

/// An aborted transaction releases the lock without the `info` event.
const ABORT_MESSAGE: &str = "applying transaction";
const ABORT_ANNOTATION: &str = "stopped";

/// Lock bookkeeping that did not pair up.
#[derive(Debug, Clone, PartialEq)]
pub enum LockAnomaly {
    /// Acquired again while already held; the earlier acquisition is dropped
    Reacquired { transaction_id: String, line: u64 },
    /// Released without a pending acquisition
    ReleaseWithoutAcquire { transaction_id: String, line: u64 },
    /// Still held at end of stream
    NeverReleased {
        transaction_id: String,
        line: u64,
        acquired_at: NaiveDateTime,
    },
}

impl std::fmt::Display for LockAnomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockAnomaly::Reacquired {
                transaction_id,
                line,
            } => write!(
                f,
                "line {line}: transaction {transaction_id} took the lock again while holding it"
            ),
            LockAnomaly::ReleaseWithoutAcquire {
                transaction_id,
                line,
            } => write!(
                f,
                "line {line}: transaction {transaction_id} released a lock it never took"
            ),
            LockAnomaly::NeverReleased {
                transaction_id,
                line,
                ..
            } => write!(
                f,
                "line {line}: transaction {transaction_id} never released the lock"
            ),
        }
    }
}

#[derive(Debug)]
struct PendingLock {
    acquired_at: NaiveDateTime,
    line: u64,
}

/// Pairs lock acquisition and release events per transaction.
#[derive(Debug, Default)]
pub struct LockSynthesizer {
    pending: IndexMap<String, PendingLock>,
    anomalies: Vec<LockAnomaly>,
}

impl LockSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass `event` through to `out`, followed by any synthetic event it
    /// triggers.
    pub fn process(&mut self, event: Event, out: &mut Vec<Event>) {
        let synthetic = if is_acquisition(&event) {
            Some(self.acquire(&event))
        } else if is_release(&event) {
            self.release(&event, true)
        } else if is_abort(&event) {
            self.release(&event, false)
        } else {
            None
        };

        out.push(event);
        out.extend(synthetic);
    }

    /// Report locks that were never released and reset.
    pub fn finish(&mut self) -> Vec<LockAnomaly> {
        for (transaction_id, lock) in self.pending.drain(..) {
            log::info!("Transaction {transaction_id} never released the lock");
            self.anomalies.push(LockAnomaly::NeverReleased {
                transaction_id,
                line: lock.line,
                acquired_at: lock.acquired_at,
            });
        }
        std::mem::take(&mut self.anomalies)
    }

    /// Transactions currently holding the lock.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.keys().map(String::as_str)
    }

    fn acquire(&mut self, event: &Event) -> Event {
        let lock = PendingLock {
            acquired_at: event.timestamp,
            line: event.line,
        };
        if self
            .pending
            .insert(event.transaction_id.clone(), lock)
            .is_some()
        {
            log::info!(
                "Transaction {} took the lock again at line {}",
                event.transaction_id,
                event.line
            );
            self.anomalies.push(LockAnomaly::Reacquired {
                transaction_id: event.transaction_id.clone(),
                line: event.line,
            });
        }
        synthesize(event, Tag::Start, None)
    }

    fn release(&mut self, event: &Event, expected: bool) -> Option<Event> {
        let Some(lock) = self.pending.shift_remove(&event.transaction_id) else {
            if expected {
                log::info!(
                    "Failed to find start event for transaction lock {} at line {}",
                    event.transaction_id,
                    event.line
                );
                self.anomalies.push(LockAnomaly::ReleaseWithoutAcquire {
                    transaction_id: event.transaction_id.clone(),
                    line: event.line,
                });
            }
            return None;
        };
        let held = seconds_between(lock.acquired_at, event.timestamp).max(0.0);
        Some(synthesize(event, Tag::Stop, Some(held)))
    }
}

fn is_acquisition(event: &Event) -> bool {
    event.tag == Tag::Stop && ACQUIRE_MESSAGES.contains(&event.message.as_str())
}

fn is_release(event: &Event) -> bool {
    event.tag == Tag::Info && event.message == RELEASE_MESSAGE
}

fn is_abort(event: &Event) -> bool {
    event.tag == Tag::Stop && event.message == ABORT_MESSAGE && event.annotation == ABORT_ANNOTATION
}

/// Synthetic lock event stamped like `trigger`.
///
/// Only the transaction-level identifiers are carried over, so the start
/// (built from the acquisition) and the stop (built from the release) key
/// identically even when the triggers differ in span or device.
fn synthesize(trigger: &Event, tag: Tag, duration: Option<f64>) -> Event {
    Event {
        line: trigger.line,
        tag,
        timestamp: trigger.timestamp,
        timestamp_text: trigger.timestamp_text.clone(),
        duration,
        session_id: trigger.session_id.clone(),
        transaction_id: trigger.transaction_id.clone(),
        trace_id: String::new(),
        span_id: String::new(),
        parent_span_id: String::new(),
        datastore: trigger.datastore.clone(),
        context: trigger.context.clone(),
        service: String::new(),
        node: String::new(),
        device: String::new(),
        message: HOLDING_LOCK.to_string(),
        annotation: String::new(),
        synthetic: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::event::tests::{classic_event, classic_row};
    use crate::trace::key::SpanKey;

    fn run(synth: &mut LockSynthesizer, rows: &[String]) -> Vec<Event> {
        let mut out = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            synth.process(classic_event(i as u64 + 1, row), &mut out);
        }
        out
    }

    #[test]
    fn test_acquire_release_round_trip() {
        let mut synth = LockSynthesizer::new();
        let out = run(
            &mut synth,
            &[
                classic_row("stop", "2024-01-01T00:00:00.000000", "0.1", "7", "grabbing transaction lock", ""),
                classic_row("info", "2024-01-01T00:00:02.000000", "", "7", "releasing transaction lock", ""),
            ],
        );

        assert_eq!(out.len(), 4);
        let (start, stop) = (&out[1], &out[3]);

        assert!(start.synthetic && stop.synthetic);
        assert_eq!(start.tag, Tag::Start);
        assert_eq!(start.message, HOLDING_LOCK);
        assert_eq!(start.timestamp, out[0].timestamp);
        assert_eq!(stop.tag, Tag::Stop);
        assert_eq!(stop.timestamp, out[2].timestamp);
        assert_eq!(stop.duration, Some(2.0));
        assert_eq!(SpanKey::of(start), SpanKey::of(stop));

        assert!(synth.finish().is_empty());
    }

    #[test]
    fn test_taking_alias_acquires() {
        let mut synth = LockSynthesizer::new();
        let out = run(
            &mut synth,
            &[classic_row("stop", "2024-01-01T00:00:00", "", "7", "taking transaction lock", "")],
        );
        assert_eq!(out.len(), 2);
        assert_eq!(synth.pending().collect::<Vec<_>>(), vec!["7"]);
    }

    #[test]
    fn test_start_of_grabbing_does_not_acquire() {
        let mut synth = LockSynthesizer::new();
        let out = run(
            &mut synth,
            &[classic_row("start", "2024-01-01T00:00:00", "", "7", "grabbing transaction lock", "")],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(synth.pending().count(), 0);
    }

    #[test]
    fn test_reacquire_overwrites_and_is_reported() {
        let mut synth = LockSynthesizer::new();
        let out = run(
            &mut synth,
            &[
                classic_row("stop", "2024-01-01T00:00:00", "", "7", "grabbing transaction lock", ""),
                classic_row("stop", "2024-01-01T00:00:01", "", "7", "grabbing transaction lock", ""),
                classic_row("info", "2024-01-01T00:00:04", "", "7", "releasing transaction lock", ""),
            ],
        );

        // Duration measured from the second acquisition
        assert_eq!(out.last().unwrap().duration, Some(3.0));
        assert_eq!(
            synth.finish(),
            vec![LockAnomaly::Reacquired {
                transaction_id: "7".into(),
                line: 2
            }]
        );
    }

    #[test]
    fn test_release_without_acquire() {
        let mut synth = LockSynthesizer::new();
        let out = run(
            &mut synth,
            &[classic_row("info", "2024-01-01T00:00:00", "", "9", "releasing transaction lock", "")],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(
            synth.finish(),
            vec![LockAnomaly::ReleaseWithoutAcquire {
                transaction_id: "9".into(),
                line: 1
            }]
        );
    }

    #[test]
    fn test_aborted_transaction_releases() {
        let mut synth = LockSynthesizer::new();
        let out = run(
            &mut synth,
            &[
                classic_row("stop", "2024-01-01T00:00:00", "", "7", "grabbing transaction lock", ""),
                classic_row("stop", "2024-01-01T00:00:00.5", "0.6", "7", "applying transaction", "stopped"),
                // A normal completion without a pending lock is not an anomaly
                classic_row("stop", "2024-01-01T00:00:01", "0.1", "8", "applying transaction", "stopped"),
            ],
        );

        assert_eq!(out.len(), 5);
        assert_eq!(out[3].message, HOLDING_LOCK);
        assert_eq!(out[3].duration, Some(0.5));
        assert!(synth.finish().is_empty());
    }

    #[test]
    fn test_unreleased_locks_reported_per_transaction() {
        let mut synth = LockSynthesizer::new();
        run(
            &mut synth,
            &[
                classic_row("stop", "2024-01-01T00:00:00", "", "7", "grabbing transaction lock", ""),
                classic_row("stop", "2024-01-01T00:00:01", "", "8", "grabbing transaction lock", ""),
            ],
        );

        let anomalies = synth.finish();
        let tids: Vec<_> = anomalies
            .iter()
            .map(|a| match a {
                LockAnomaly::NeverReleased { transaction_id, .. } => transaction_id.as_str(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(tids, vec!["7", "8"]);
        assert_eq!(synth.pending().count(), 0);
    }
}
