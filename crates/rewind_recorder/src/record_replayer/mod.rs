//! Recorder and player pairs behind one state machine.
//!
//! This module provides:
//! - `EditorRecordReplayer` - One editing recorder plus one player
//! - `MultiEditorRecordReplayer` - Several named editors recorded and played together
//! - `RecordReplayer` - An editing track slaved to an audio clock
//!
//! Every composition moves through `paused → recording → paused →
//! playing → paused`, and rejects `record()`/`play()` unless paused.

mod multi;
mod synced;
mod track;

pub use multi::MultiEditorRecordReplayer;
pub use synced::{Content, RecordReplayer};
pub use track::EditorRecordReplayer;

use crate::error::Result;
use rewind_core::Timestamp;

/// Externally observable state of a record-replayer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplayerState {
    #[default]
    Paused,
    Playing,
    Recording,
}

impl ReplayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplayerState::Paused => "paused",
            ReplayerState::Playing => "playing",
            ReplayerState::Recording => "recording",
        }
    }
}

/// Notifications from a record-replayer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayerEvent {
    /// Playback reached the end and rewound to zero
    Ended,
    /// New content was loaded
    SrcChanged,
    /// The position was moved
    Seeked,
    PlaybackRateChange,
    StartedRecording,
}

/// The editing half of a synchronized recording.
///
/// Times are in seconds. Implemented by a single editor and by a set of
/// named editors.
pub trait EditorTrack {
    /// Recorded content: one trace, or one per editor.
    type Source: Clone;

    fn state(&self) -> ReplayerState;

    fn record(&mut self) -> Result<()>;
    /// Stop recording and load the result for playback.
    fn stop(&mut self) -> Result<Self::Source>;

    fn play(&mut self) -> Result<()>;
    /// Pause playback. Does nothing unless playing.
    fn pause(&mut self);
    /// Apply every record due at the current position.
    fn sync(&mut self) -> Result<()>;

    fn tick(&mut self) -> Result<()>;
    fn next_deadline(&self) -> Option<Timestamp>;

    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, secs: f64) -> Result<()>;
    fn duration(&self) -> f64;

    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&mut self, rate: f64) -> Result<()>;

    fn src(&self) -> Option<Self::Source>;
    fn set_src(&mut self, src: Option<Self::Source>) -> Result<()>;

    /// Duration of each trace in `source`, labelled for error reporting.
    fn trace_durations(source: &Self::Source) -> Vec<(String, i64)>;
}
