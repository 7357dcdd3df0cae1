//! Configuration for recording and playback

use serde::{Deserialize, Serialize};

/// Streamer configuration
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct StreamerConfig {
    /// Minimum spacing between selection, scroll and viewport evaluations
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: i64,
}

fn default_throttle_ms() -> i64 {
    100
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
        }
    }
}

impl StreamerConfig {
    pub fn with_throttle_ms(mut self, throttle_ms: i64) -> Self {
        self.throttle_ms = throttle_ms;
        self
    }
}

/// Recorder checkpoint options
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct RecorderOptions {
    /// Timer checkpoint period. Zero disables the timer.
    #[serde(default = "default_checkpoint_interval_ms")]
    pub checkpoint_interval_ms: i64,
    /// Insert a checkpoint after this many non-checkpoint records
    #[serde(default)]
    pub checkpoint_event_count: Option<usize>,
    #[serde(default)]
    pub streamer: StreamerConfig,
}

fn default_checkpoint_interval_ms() -> i64 {
    1000
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            checkpoint_interval_ms: default_checkpoint_interval_ms(),
            checkpoint_event_count: None,
            streamer: StreamerConfig::default(),
        }
    }
}

impl RecorderOptions {
    pub fn with_checkpoint_interval_ms(mut self, interval: i64) -> Self {
        self.checkpoint_interval_ms = interval;
        self
    }

    pub fn with_checkpoint_event_count(mut self, count: usize) -> Self {
        self.checkpoint_event_count = Some(count);
        self
    }

    pub fn with_streamer(mut self, streamer: StreamerConfig) -> Self {
        self.streamer = streamer;
        self
    }

    /// Check the options, describing the first bad value.
    pub fn validate(&self) -> Result<(), String> {
        if self.checkpoint_interval_ms < 0 {
            return Err(format!(
                "checkpoint interval must not be negative (got {})",
                self.checkpoint_interval_ms
            ));
        }
        if self.checkpoint_event_count == Some(0) {
            return Err("checkpoint event count must be positive".to_string());
        }
        if self.streamer.throttle_ms < 0 {
            return Err(format!(
                "throttle window must not be negative (got {})",
                self.streamer.throttle_ms
            ));
        }
        Ok(())
    }
}

/// Player configuration
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PlayerConfig {
    /// Initial playback rate (1.0 = recorded speed)
    #[serde(default = "default_playback_rate")]
    pub playback_rate: f64,
    /// Follow the cursor instead of replaying recorded scroll offsets
    #[serde(default)]
    pub scroll_to_cursor: bool,
}

fn default_playback_rate() -> f64 {
    1.0
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            playback_rate: default_playback_rate(),
            scroll_to_cursor: false,
        }
    }
}

impl PlayerConfig {
    pub fn with_playback_rate(mut self, rate: f64) -> Self {
        self.playback_rate = rate;
        self
    }

    pub fn with_scroll_to_cursor(mut self, scroll_to_cursor: bool) -> Self {
        self.scroll_to_cursor = scroll_to_cursor;
        self
    }
}

/// Tolerances between the editing and audio clocks
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Largest accepted difference between recorded editing and audio durations
    #[serde(default = "default_duration_tolerance_ms")]
    pub duration_tolerance_ms: i64,
    /// Playback drift that triggers a correction to the audio position
    #[serde(default = "default_drift_tolerance_secs")]
    pub drift_tolerance_secs: f64,
}

fn default_duration_tolerance_ms() -> i64 {
    100
}

fn default_drift_tolerance_secs() -> f64 {
    0.1
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            duration_tolerance_ms: default_duration_tolerance_ms(),
            drift_tolerance_secs: default_drift_tolerance_secs(),
        }
    }
}

impl SyncConfig {
    pub fn with_duration_tolerance_ms(mut self, tolerance: i64) -> Self {
        self.duration_tolerance_ms = tolerance;
        self
    }

    pub fn with_drift_tolerance_secs(mut self, tolerance: f64) -> Self {
        self.drift_tolerance_secs = tolerance;
        self
    }
}

/// Top-level configuration (rewind.toml)
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RewindConfig {
    #[serde(default)]
    pub recorder: RecorderOptions,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}
