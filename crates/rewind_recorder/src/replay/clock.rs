//! Virtual clock for trace playback.
//!
//! Maps wall-clock instants onto a simulated offset into the trace. The
//! clock stores the offset reached at its last anchor and, while running,
//! the wall-clock instant of that anchor:
//!
//! `offset(now) = anchor_offset + (now - anchor) * rate`
//!
//! Pausing, seeking and rate changes re-anchor the clock, so the offset
//! stays continuous across all three.

use rewind_core::time::{add_millis, elapsed_millis};
use rewind_core::Timestamp;

/// A pausable, seekable clock measuring milliseconds into a trace.
#[derive(Clone, Debug)]
pub struct PlaybackClock {
    /// Offset at the anchor, in milliseconds.
    position_ms: f64,
    /// Wall-clock instant of the anchor. Set only while running.
    anchor: Option<Timestamp>,
    /// Playback rate multiplier (1.0 = recorded speed).
    rate: f64,
    /// Trace duration in milliseconds.
    duration_ms: f64,
}

impl PlaybackClock {
    pub fn new(duration_ms: f64) -> Self {
        Self {
            position_ms: 0.0,
            anchor: None,
            rate: 1.0,
            duration_ms,
        }
    }

    /// Simulated offset at `now`.
    pub fn position(&self, now: Timestamp) -> f64 {
        match self.anchor {
            Some(anchor) => self.position_ms + elapsed_millis(anchor, now) * self.rate,
            None => self.position_ms,
        }
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    pub fn is_running(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Change the rate without moving the offset.
    pub fn set_rate(&mut self, now: Timestamp, rate: f64) {
        self.reanchor(now);
        self.rate = rate;
    }

    /// Start or resume the clock.
    pub fn play(&mut self, now: Timestamp) {
        if self.anchor.is_none() {
            self.anchor = Some(now);
        }
    }

    /// Freeze the clock at its current offset.
    pub fn pause(&mut self, now: Timestamp) {
        if self.anchor.is_some() {
            self.position_ms = self.position(now);
            self.anchor = None;
        }
    }

    /// Jump to `position_ms`, keeping the running state.
    pub fn seek(&mut self, now: Timestamp, position_ms: f64) {
        self.position_ms = position_ms;
        if self.anchor.is_some() {
            self.anchor = Some(now);
        }
    }

    /// Wall-clock instant corresponding to offset zero.
    pub fn start_wall_time(&self, now: Timestamp) -> Timestamp {
        add_millis(now, -self.position(now) / self.rate)
    }

    /// Wall-clock instant at which the clock reaches `offset_ms`.
    pub fn wall_time_at(&self, now: Timestamp, offset_ms: f64) -> Timestamp {
        add_millis(now, (offset_ms - self.position(now)) / self.rate)
    }

    /// Progress through the trace, 0.0 to 1.0.
    pub fn progress(&self, now: Timestamp) -> f64 {
        if self.duration_ms <= 0.0 {
            return 0.0;
        }
        (self.position(now) / self.duration_ms).clamp(0.0, 1.0)
    }

    /// Check if the clock has reached the end.
    pub fn is_at_end(&self, now: Timestamp) -> bool {
        self.position(now) >= self.duration_ms
    }

    /// Stop at the beginning.
    pub fn reset(&mut self) {
        self.position_ms = 0.0;
        self.anchor = None;
    }

    fn reanchor(&mut self, now: Timestamp) {
        if self.anchor.is_some() {
            self.position_ms = self.position(now);
            self.anchor = Some(now);
        }
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}
