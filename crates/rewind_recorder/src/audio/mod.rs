//! Audio capture and playback.
//!
//! The audio device is external: capture goes through [`AudioInput`] and
//! playback through [`AudioOutput`]. Device acquisition and playback start
//! are the only asynchronous steps in the crate.

mod recorder;
mod replayer;

pub use recorder::AudioRecorder;
pub use replayer::{AudioRecordReplayer, AudioState};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by audio devices.
#[derive(Error, Debug)]
pub enum AudioError {
    /// The device could not be acquired or failed while running
    #[error("Audio device failed: {0}")]
    Device(String),

    /// Playback requested with nothing loaded
    #[error("No audio source loaded")]
    NoSource,

    /// The output refused to start, e.g. an autoplay policy
    #[error("Playback rejected: {0}")]
    PlaybackRejected(String),

    #[error("Invalid audio payload: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Notifications from an audio output, mirroring a media element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioEvent {
    /// Playback actually started or resumed
    Playing,
    /// Playback paused
    Pause,
    /// Waiting for data
    Waiting,
    /// Data stopped arriving
    Stalled,
    /// The position advanced
    TimeUpdate,
    /// Playback reached the end
    Ended,
}

/// A recorded audio blob plus its duration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioClip {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub mime_type: String,
    pub duration_ms: i64,
}

impl AudioClip {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>, duration_ms: i64) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            duration_ms,
        }
    }

    /// Decode a clip from its base64 payload.
    pub fn from_base64(payload: &str, mime_type: impl Into<String>, duration_ms: i64) -> Result<Self, AudioError> {
        Ok(Self::new(STANDARD.decode(payload.trim())?, mime_type, duration_ms))
    }

    /// Standard-alphabet base64 of the raw data.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.trim()).map_err(de::Error::custom)
    }
}

/// A capture device.
#[async_trait(?Send)]
pub trait AudioInput {
    /// Acquire the device and begin capturing.
    async fn start(&mut self) -> Result<(), AudioError>;

    /// Stop capturing and hand back the recording.
    async fn stop(&mut self) -> Result<AudioClip, AudioError>;
}

/// A playback device. Times are in seconds.
#[async_trait(?Send)]
pub trait AudioOutput {
    /// Load a clip, or unload with `None`. Resets the position.
    fn load(&mut self, clip: Option<&AudioClip>) -> Result<(), AudioError>;

    /// Start playback once the device is ready.
    async fn play(&mut self) -> Result<(), AudioError>;

    fn pause(&mut self);
    fn is_playing(&self) -> bool;

    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, secs: f64);

    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&mut self, rate: f64);

    /// Duration of the loaded clip, 0 when empty.
    fn duration(&self) -> f64;

    /// Drain pending notifications.
    fn take_events(&mut self) -> Vec<AudioEvent> {
        Vec::new()
    }
}
