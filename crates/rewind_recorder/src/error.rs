//! Recorder and player error types

use crate::audio::AudioError;
use rewind_core::{SurfaceError, TraceError};
use thiserror::Error;

/// Errors raised by recorders, players and their compositions.
#[derive(Error, Debug)]
pub enum Error {
    /// `stop()` on a streamer that is not running
    #[error("Not running")]
    NotRunning,

    /// A recording-only operation was called while not recording
    #[error("Not recording")]
    NotRecording,

    /// A state-machine transition was requested from the wrong state
    #[error("Expected state {expected} but was {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },

    /// Playback was requested without a trace
    #[error("No trace loaded")]
    NoTrace,

    /// Seek target outside the trace
    #[error("Bad timestamp: {target_secs}s is outside [0, {duration_secs}s]")]
    OutOfRange { target_secs: f64, duration_secs: f64 },

    /// The seek lookup table points past the target
    #[error("Bad index value {index} for {target_ms}ms")]
    BadIndex { index: usize, target_ms: f64 },

    /// Playback rate must be finite and positive
    #[error("Bad playback rate: {0}")]
    InvalidPlaybackRate(f64),

    /// The session was never registered
    #[error("Session `{0}` does not exist")]
    UnknownSession(String),

    /// The session name is already registered
    #[error("Session `{0}` already exists")]
    DuplicateSession(String),

    /// The active session cannot be removed
    #[error("Can't delete active session `{0}`")]
    ActiveSession(String),

    /// Sessions changed while recording without a session label
    #[error("Must set a session name if switching sessions during recording")]
    SessionLabelRequired,

    /// External payloads may not carry their own `type`
    #[error("type property in external changes is overwritten")]
    ExternalTypeCollision,

    /// Recorder options failed validation
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Editing and audio recordings disagree on length
    #[error("Recordings do not have equal length: editor {editor_ms}ms <-> audio {audio_ms}ms (tolerance {tolerance_ms}ms)")]
    DurationMismatch {
        editor_ms: i64,
        audio_ms: i64,
        tolerance_ms: i64,
    },

    /// Content cannot be swapped in this state
    #[error("Can't change source while {0}")]
    SourceLocked(&'static str),

    /// A named editor track does not exist
    #[error("No editor named `{0}`")]
    UnknownEditor(String),

    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Result type for recorder and player operations
pub type Result<T> = std::result::Result<T, Error>;
