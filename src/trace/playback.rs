//! Playback pacing, refresh cadence and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::NaiveDateTime;

use super::event::seconds_between;

/// Longest uninterrupted sleep; cancellation is noticed within this.
pub const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// How records are consumed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    /// As fast as the source yields
    Batch,
    /// Replay the trace's own gaps, divided by `speedup`
    RealTime { speedup: f64 },
    /// Tail the source; waits only when it has nothing new
    Follow,
}

impl Pacing {
    /// Whether the display refreshes while the stream is consumed.
    pub fn is_live(self) -> bool {
        !matches!(self, Pacing::Batch)
    }
}

/// Shared cancel flag, set from a signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// The underlying flag, for `signal_hook::flag::register`.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps on the current thread.
#[derive(Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Sleep for `duration` in slices, returning early once `cancel` is set.
///
/// Returns `false` if cancelled.
pub fn wait(sleeper: &mut impl Sleeper, duration: Duration, cancel: &CancelToken) -> bool {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if cancel.is_cancelled() {
            return false;
        }
        let slice = remaining.min(SLEEP_SLICE);
        sleeper.sleep(slice);
        remaining -= slice;
    }
    !cancel.is_cancelled()
}

/// Computes the pause before each admitted event.
#[derive(Debug)]
pub struct Pacer {
    pacing: Pacing,
    previous: Option<NaiveDateTime>,
}

impl Pacer {
    pub fn new(pacing: Pacing) -> Self {
        Self {
            pacing,
            previous: None,
        }
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// Pause to take before processing an event stamped `timestamp`.
    ///
    /// Only real-time playback ever pauses; out-of-order stamps don't.
    pub fn delay_before(&mut self, timestamp: NaiveDateTime) -> Duration {
        let previous = self.previous.replace(timestamp);
        let Pacing::RealTime { speedup } = self.pacing else {
            return Duration::ZERO;
        };
        let Some(previous) = previous else {
            return Duration::ZERO;
        };

        let gap = seconds_between(previous, timestamp) / speedup;
        // Gaps past what a Duration holds just mean "wait until interrupted"
        if gap > 0.0 {
            Duration::try_from_secs_f64(gap).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }
}

/// Decides when a live display redraws.
///
/// Redraws when trace time has moved on by more than `threshold` since the
/// last redraw, and on request (idle periods, end of stream).
#[derive(Debug)]
pub struct RefreshPolicy {
    threshold: f64,
    last_refresh: Option<NaiveDateTime>,
    pending: bool,
}

impl RefreshPolicy {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold: threshold.as_secs_f64(),
            last_refresh: None,
            pending: false,
        }
    }

    /// Note an event; returns whether to redraw now.
    pub fn on_event(&mut self, timestamp: NaiveDateTime) -> bool {
        self.pending = true;
        let last = *self.last_refresh.get_or_insert(timestamp);
        seconds_between(last, timestamp) > self.threshold
    }

    /// Whether events arrived since the last redraw.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn refreshed(&mut self, at: Option<NaiveDateTime>) {
        self.pending = false;
        if at.is_some() {
            self.last_refresh = at;
        }
    }
}
