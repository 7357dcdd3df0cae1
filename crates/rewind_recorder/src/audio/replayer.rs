use super::{AudioClip, AudioEvent, AudioInput, AudioOutput, AudioRecorder};
use crate::error::{Error, Result};
use rewind_core::SharedClock;

/// State of an [`AudioRecordReplayer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioState {
    /// Nothing loaded
    Empty,
    Paused,
    Playing,
    Recording,
}

impl AudioState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioState::Empty => "empty",
            AudioState::Paused => "paused",
            AudioState::Playing => "playing",
            AudioState::Recording => "recording",
        }
    }
}

type StateListener = Box<dyn FnMut(AudioState)>;

/// One capture device and one playback device behind a single state machine.
///
/// A finished recording is loaded into the output, ready to play.
pub struct AudioRecordReplayer<I: AudioInput, O: AudioOutput> {
    recorder: AudioRecorder<I>,
    output: O,
    clip: Option<AudioClip>,
    state: AudioState,
    listeners: Vec<StateListener>,
}

impl<I: AudioInput, O: AudioOutput> AudioRecordReplayer<I, O> {
    pub fn new(input: I, output: O, clock: SharedClock) -> Self {
        Self {
            recorder: AudioRecorder::new(input, clock),
            output,
            clip: None,
            state: AudioState::Empty,
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> AudioState {
        self.state
    }

    pub fn recorder(&self) -> &AudioRecorder<I> {
        &self.recorder
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn add_state_listener(&mut self, listener: impl FnMut(AudioState) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub async fn play(&mut self) -> Result<()> {
        if self.state != AudioState::Paused {
            return Err(self.unexpected(AudioState::Paused));
        }
        self.output.play().await?;
        self.set_state(AudioState::Playing);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.state != AudioState::Playing {
            return Err(self.unexpected(AudioState::Playing));
        }
        self.output.pause();
        self.set_state(AudioState::Paused);
        Ok(())
    }

    pub async fn record(&mut self) -> Result<()> {
        if !matches!(self.state, AudioState::Paused | AudioState::Empty) {
            return Err(self.unexpected(AudioState::Paused));
        }
        self.recorder.start().await?;
        self.set_state(AudioState::Recording);
        Ok(())
    }

    /// Stop recording and load the clip for playback.
    pub async fn stop(&mut self) -> Result<AudioClip> {
        if self.state != AudioState::Recording {
            return Err(Error::NotRecording);
        }
        let clip = match self.recorder.stop().await {
            Ok(clip) => clip,
            Err(err) => {
                self.set_state(if self.clip.is_some() { AudioState::Paused } else { AudioState::Empty });
                return Err(err);
            }
        };
        self.output.load(Some(&clip))?;
        self.clip = Some(clip.clone());
        self.set_state(AudioState::Paused);
        Ok(clip)
    }

    /// Drop the loaded clip.
    pub fn discard(&mut self) {
        if self.state == AudioState::Playing {
            self.output.pause();
        }
        if let Err(err) = self.output.load(None) {
            tracing::warn!(%err, "audio output failed to unload");
        }
        self.clip = None;
        if self.state != AudioState::Recording {
            self.set_state(AudioState::Empty);
        }
    }

    pub fn src(&self) -> Option<&AudioClip> {
        self.clip.as_ref()
    }

    /// Replace the loaded clip. Rejected while playing or recording.
    pub fn set_src(&mut self, clip: Option<AudioClip>) -> Result<()> {
        match self.state {
            AudioState::Playing | AudioState::Recording => return Err(Error::SourceLocked(self.state.as_str())),
            AudioState::Empty | AudioState::Paused => {}
        }
        self.output.load(clip.as_ref())?;
        self.set_state(if clip.is_some() { AudioState::Paused } else { AudioState::Empty });
        self.clip = clip;
        Ok(())
    }

    /// Drain output notifications, following the output's own stops.
    pub fn poll_events(&mut self) -> Vec<AudioEvent> {
        let events = self.output.take_events();
        for event in &events {
            let stopped = match event {
                AudioEvent::Ended => true,
                // Stale if playback was resumed since
                AudioEvent::Pause => !self.output.is_playing(),
                _ => false,
            };
            if stopped && self.state == AudioState::Playing {
                self.set_state(AudioState::Paused);
            }
        }
        events
    }

    pub fn current_time(&self) -> f64 {
        self.output.current_time()
    }

    pub fn set_current_time(&mut self, secs: f64) {
        self.output.set_current_time(secs);
    }

    pub fn duration(&self) -> f64 {
        self.output.duration()
    }

    pub fn percent(&self) -> f64 {
        let duration = self.duration();
        if duration <= 0.0 {
            return 0.0;
        }
        self.current_time() / duration * 100.0
    }

    pub fn set_percent(&mut self, percent: f64) {
        let secs = self.duration() * percent / 100.0;
        self.output.set_current_time(secs);
    }

    pub fn playback_rate(&self) -> f64 {
        self.output.playback_rate()
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        self.output.set_playback_rate(rate);
    }

    fn unexpected(&self, expected: AudioState) -> Error {
        Error::InvalidState {
            expected: expected.as_str(),
            found: self.state.as_str(),
        }
    }

    fn set_state(&mut self, state: AudioState) {
        if state == self.state {
            return;
        }
        tracing::debug!(from = self.state.as_str(), to = state.as_str(), "audio state");
        self.state = state;
        for listener in &mut self.listeners {
            listener(state);
        }
    }
}
