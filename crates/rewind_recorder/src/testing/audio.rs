//! Scripted audio devices driven by a [`rewind_core::ManualClock`].

use crate::audio::{AudioClip, AudioError, AudioEvent, AudioInput, AudioOutput};
use async_trait::async_trait;
use rewind_core::time::elapsed_millis;
use rewind_core::{SharedClock, Timestamp};

/// Capture device that records silence for as long as the clock runs.
pub struct ScriptedMicrophone {
    clock: SharedClock,
    started: Option<Timestamp>,
    denied: bool,
    mime_type: String,
    /// Duration claimed by the container, if it differs from elapsed time.
    reported_duration_ms: Option<i64>,
}

impl ScriptedMicrophone {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            started: None,
            denied: false,
            mime_type: "audio/webm".to_string(),
            reported_duration_ms: None,
        }
    }

    /// A microphone whose permission prompt is refused.
    pub fn denied(clock: SharedClock) -> Self {
        Self {
            denied: true,
            ..Self::new(clock)
        }
    }

    pub fn with_reported_duration_ms(mut self, duration_ms: i64) -> Self {
        self.reported_duration_ms = Some(duration_ms);
        self
    }
}

#[async_trait(?Send)]
impl AudioInput for ScriptedMicrophone {
    async fn start(&mut self) -> Result<(), AudioError> {
        if self.denied {
            return Err(AudioError::Device("permission denied".to_string()));
        }
        self.started = Some(self.clock.now());
        Ok(())
    }

    async fn stop(&mut self) -> Result<AudioClip, AudioError> {
        let started = self
            .started
            .take()
            .ok_or_else(|| AudioError::Device("not capturing".to_string()))?;
        let elapsed = elapsed_millis(started, self.clock.now()) as i64;
        // 8 kHz, 8-bit mono silence
        let data = vec![0x80; (elapsed.max(0) as usize) * 8];
        Ok(AudioClip::new(
            data,
            self.mime_type.clone(),
            self.reported_duration_ms.unwrap_or(elapsed),
        ))
    }
}

/// Playback device whose position follows the clock.
///
/// Emits `TimeUpdate` on every poll while playing and `Ended` once the
/// position reaches the duration.
pub struct ScriptedSpeaker {
    clock: SharedClock,
    duration: f64,
    loaded: bool,
    /// Position at the anchor, in seconds.
    position: f64,
    anchor: Option<Timestamp>,
    rate: f64,
    reject_play: bool,
    events: Vec<AudioEvent>,
}

impl ScriptedSpeaker {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            duration: 0.0,
            loaded: false,
            position: 0.0,
            anchor: None,
            rate: 1.0,
            reject_play: false,
            events: Vec::new(),
        }
    }

    /// Refuse the next `play()` calls, like an autoplay policy.
    pub fn reject_play(&mut self, reject: bool) {
        self.reject_play = reject;
    }

    /// Stop delivering data. The position freezes until [`resume`](Self::resume).
    pub fn stall(&mut self) {
        self.freeze();
        self.events.push(AudioEvent::Waiting);
        self.events.push(AudioEvent::Stalled);
    }

    pub fn resume(&mut self) {
        if self.anchor.is_none() {
            self.anchor = Some(self.clock.now());
            self.events.push(AudioEvent::Playing);
        }
    }

    /// Move the position without notifying, as a glitching device would.
    pub fn jump_to(&mut self, secs: f64) {
        self.position = secs.clamp(0.0, self.duration);
        if self.anchor.is_some() {
            self.anchor = Some(self.clock.now());
        }
    }

    fn freeze(&mut self) {
        if self.anchor.is_some() {
            self.position = self.current_time();
            self.anchor = None;
        }
    }
}

#[async_trait(?Send)]
impl AudioOutput for ScriptedSpeaker {
    fn load(&mut self, clip: Option<&AudioClip>) -> Result<(), AudioError> {
        self.anchor = None;
        self.position = 0.0;
        self.loaded = clip.is_some();
        self.duration = clip.map_or(0.0, AudioClip::duration_secs);
        Ok(())
    }

    async fn play(&mut self) -> Result<(), AudioError> {
        if !self.loaded {
            return Err(AudioError::NoSource);
        }
        if self.reject_play {
            return Err(AudioError::PlaybackRejected("autoplay blocked".to_string()));
        }
        if self.position >= self.duration {
            self.position = 0.0;
        }
        self.anchor = Some(self.clock.now());
        self.events.push(AudioEvent::Playing);
        Ok(())
    }

    fn pause(&mut self) {
        if self.anchor.is_some() {
            self.freeze();
            self.events.push(AudioEvent::Pause);
        }
    }

    fn is_playing(&self) -> bool {
        self.anchor.is_some()
    }

    fn current_time(&self) -> f64 {
        let position = match self.anchor {
            Some(anchor) => self.position + elapsed_millis(anchor, self.clock.now()) / 1000.0 * self.rate,
            None => self.position,
        };
        position.min(self.duration)
    }

    fn set_current_time(&mut self, secs: f64) {
        self.jump_to(secs);
    }

    fn playback_rate(&self) -> f64 {
        self.rate
    }

    fn set_playback_rate(&mut self, rate: f64) {
        if self.anchor.is_some() {
            self.position = self.current_time();
            self.anchor = Some(self.clock.now());
        }
        self.rate = rate;
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn take_events(&mut self) -> Vec<AudioEvent> {
        if self.anchor.is_some() {
            self.events.push(AudioEvent::TimeUpdate);
            if self.current_time() >= self.duration {
                self.position = self.duration;
                self.anchor = None;
                self.events.push(AudioEvent::Ended);
            }
        }
        std::mem::take(&mut self.events)
    }
}
