//! Leading-edge throttle with a trailing evaluation.

use chrono::Duration;
use rewind_core::time::millis_between;
use rewind_core::Timestamp;

/// Limits an evaluation to once per window.
///
/// The first signal in a quiet period runs immediately. Signals inside the
/// window schedule one trailing run at the end of the window, so the last
/// change is never lost.
#[derive(Clone, Debug)]
pub struct Throttle {
    window_ms: i64,
    last_run: Option<Timestamp>,
    pending: Option<Timestamp>,
}

impl Throttle {
    pub fn new(window_ms: i64) -> Self {
        Self {
            window_ms: window_ms.max(0),
            last_run: None,
            pending: None,
        }
    }

    /// Register a signal at `now`. Returns true when the evaluation should run now.
    pub fn signal(&mut self, now: Timestamp) -> bool {
        match self.last_run {
            Some(last) if millis_between(last, now) < self.window_ms => {
                if self.pending.is_none() {
                    self.pending = Some(last + Duration::milliseconds(self.window_ms));
                }
                false
            }
            _ => {
                self.last_run = Some(now);
                self.pending = None;
                true
            }
        }
    }

    /// Returns true when a trailing evaluation is due at `now`.
    pub fn poll(&mut self, now: Timestamp) -> bool {
        match self.pending {
            Some(deadline) if deadline <= now => {
                self.pending = None;
                self.last_run = Some(now);
                true
            }
            _ => false,
        }
    }

    /// When the pending trailing evaluation is due.
    pub fn deadline(&self) -> Option<Timestamp> {
        self.pending
    }

    /// Drop any pending evaluation and forget the last run.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.last_run = None;
    }
}
