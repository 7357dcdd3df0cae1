//! An editing track kept in sync with an audio recording.

use super::{EditorTrack, ReplayerEvent, ReplayerState};
use crate::audio::{AudioClip, AudioEvent, AudioInput, AudioOutput, AudioRecordReplayer, AudioState};
use crate::error::{Error, Result};
use chrono::Duration;
use rewind_core::{SharedClock, SyncConfig, Timestamp};

/// How often the audio output is polled while playing, in milliseconds.
const AUDIO_POLL_MS: i64 = 250;

/// A recorded editing track plus its audio.
#[derive(Clone, Debug, PartialEq)]
pub struct Content<T> {
    pub trace: T,
    pub audio: AudioClip,
}

type StateListener = Box<dyn FnMut(ReplayerState)>;
type EventListener = Box<dyn FnMut(ReplayerEvent)>;

/// An editing track slaved to an audio clock.
///
/// Audio is authoritative during playback. The editing player follows the
/// audio output's observed state: it pauses when the audio waits, stalls
/// or pauses, re-seeks to the audio position when the audio starts playing,
/// and is corrected whenever the two drift apart by more than
/// [`SyncConfig::drift_tolerance_secs`].
///
/// Audio notifications are drained by [`tick`](Self::tick).
pub struct RecordReplayer<T: EditorTrack, I: AudioInput, O: AudioOutput> {
    editor: T,
    audio: AudioRecordReplayer<I, O>,
    clock: SharedClock,
    config: SyncConfig,
    state: ReplayerState,
    state_listeners: Vec<StateListener>,
    event_listeners: Vec<EventListener>,
}

impl<T: EditorTrack, I: AudioInput, O: AudioOutput> RecordReplayer<T, I, O> {
    /// Compose an editing track with audio devices. `clock` times the audio.
    pub fn new(editor: T, input: I, output: O, clock: SharedClock) -> Self {
        Self::with_config(editor, input, output, clock, SyncConfig::default())
    }

    pub fn with_config(editor: T, input: I, output: O, clock: SharedClock, config: SyncConfig) -> Self {
        Self {
            editor,
            audio: AudioRecordReplayer::new(input, output, clock.clone()),
            clock,
            config,
            state: ReplayerState::Paused,
            state_listeners: Vec::new(),
            event_listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> ReplayerState {
        self.state
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn editor(&self) -> &T {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut T {
        &mut self.editor
    }

    pub fn audio(&self) -> &AudioRecordReplayer<I, O> {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioRecordReplayer<I, O> {
        &mut self.audio
    }

    pub fn add_state_listener(&mut self, listener: impl FnMut(ReplayerState) + 'static) {
        self.state_listeners.push(Box::new(listener));
    }

    pub fn add_event_listener(&mut self, listener: impl FnMut(ReplayerEvent) + 'static) {
        self.event_listeners.push(Box::new(listener));
    }

    /// Start audio capture, then the editing recorder.
    pub async fn record(&mut self) -> Result<()> {
        self.expect(ReplayerState::Paused)?;
        self.audio.record().await?;
        if let Err(err) = self.editor.record() {
            if let Err(stop_err) = self.audio.stop().await {
                tracing::warn!(err = %stop_err, "audio failed to stop after editor error");
            }
            self.audio.discard();
            return Err(err);
        }
        self.set_state(ReplayerState::Recording);
        self.emit(ReplayerEvent::StartedRecording);
        Ok(())
    }

    /// Stop both recordings and check they agree on length.
    ///
    /// When any trace and the audio differ by more than
    /// [`SyncConfig::duration_tolerance_ms`], both recordings are discarded.
    pub async fn stop(&mut self) -> Result<Content<T::Source>> {
        if self.state != ReplayerState::Recording {
            return Err(Error::NotRecording);
        }
        let audio = self.audio.stop().await;
        let editor = self.editor.stop();
        self.set_state(ReplayerState::Paused);

        let (clip, source) = match (audio, editor) {
            (Ok(clip), Ok(source)) => (clip, source),
            (Err(err), _) | (_, Err(err)) => {
                self.discard();
                return Err(err);
            }
        };
        if let Err(err) = self.check_durations(&clip, &source) {
            self.discard();
            return Err(err);
        }

        tracing::debug!(audio_ms = clip.duration_ms, "synchronized recording stopped");
        self.emit(ReplayerEvent::SrcChanged);
        Ok(Content {
            trace: source,
            audio: clip,
        })
    }

    /// Start the audio and bring the editor in at the audio position.
    pub async fn play(&mut self) -> Result<()> {
        self.expect(ReplayerState::Paused)?;
        self.audio.play().await?;
        if let Err(err) = self.follow_audio() {
            if let Err(pause_err) = self.audio.pause() {
                tracing::warn!(err = %pause_err, "audio failed to pause after editor error");
            }
            return Err(err);
        }
        self.set_state(ReplayerState::Playing);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.expect(ReplayerState::Playing)?;
        if self.audio.state() == AudioState::Playing {
            self.audio.pause()?;
        }
        self.editor.pause();
        self.set_state(ReplayerState::Paused);
        Ok(())
    }

    /// Drain audio notifications, then fire due editing timers.
    pub fn tick(&mut self) -> Result<()> {
        for event in self.audio.poll_events() {
            self.handle_audio_event(event)?;
        }
        let result = self.editor.tick();
        if result.is_err() && self.state == ReplayerState::Playing {
            // The editing track paused itself; bring the audio along
            if let Err(err) = self.pause() {
                tracing::warn!(error = %err, "pausing audio after editor failure");
            }
        }
        result
    }

    /// Next editing timer, or the next audio poll while audio plays.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        let poll = (self.audio.state() == AudioState::Playing)
            .then(|| self.clock.now() + Duration::milliseconds(AUDIO_POLL_MS));
        [self.editor.next_deadline(), poll].into_iter().flatten().min()
    }

    /// Position in seconds, read from the audio when loaded.
    pub fn current_time(&self) -> f64 {
        if self.audio.src().is_some() {
            self.audio.current_time()
        } else {
            self.editor.current_time()
        }
    }

    /// Seek both clocks and apply the editing state at the target.
    pub fn set_current_time(&mut self, secs: f64) -> Result<()> {
        if self.state == ReplayerState::Recording {
            return Err(Error::InvalidState {
                expected: ReplayerState::Paused.as_str(),
                found: self.state.as_str(),
            });
        }
        let duration = self.duration();
        if !secs.is_finite() || secs < 0.0 || secs > duration {
            return Err(Error::OutOfRange {
                target_secs: secs,
                duration_secs: duration,
            });
        }
        self.editor.set_current_time(secs.min(self.editor.duration()))?;
        self.audio.set_current_time(secs);
        self.editor.sync()?;
        self.emit(ReplayerEvent::Seeked);
        Ok(())
    }

    pub fn duration(&self) -> f64 {
        if self.audio.src().is_some() {
            self.audio.duration()
        } else {
            self.editor.duration()
        }
    }

    pub fn percent(&self) -> f64 {
        let duration = self.duration();
        if duration <= 0.0 {
            return 0.0;
        }
        self.current_time() / duration * 100.0
    }

    pub fn set_percent(&mut self, percent: f64) -> Result<()> {
        self.set_current_time(self.duration() * percent / 100.0)
    }

    pub fn playback_rate(&self) -> f64 {
        self.editor.playback_rate()
    }

    pub fn set_playback_rate(&mut self, rate: f64) -> Result<()> {
        self.editor.set_playback_rate(rate)?;
        self.audio.set_playback_rate(rate);
        self.emit(ReplayerEvent::PlaybackRateChange);
        Ok(())
    }

    /// Loaded content. Unavailable while recording.
    pub fn src(&self) -> Result<Option<Content<T::Source>>> {
        if self.state == ReplayerState::Recording {
            return Err(Error::SourceLocked(self.state.as_str()));
        }
        Ok(match (self.editor.src(), self.audio.src()) {
            (Some(trace), Some(audio)) => Some(Content {
                trace,
                audio: audio.clone(),
            }),
            _ => None,
        })
    }

    /// Replace the loaded content. Rejected while playing or recording.
    pub fn set_src(&mut self, content: Option<Content<T::Source>>) -> Result<()> {
        if self.state != ReplayerState::Paused {
            return Err(Error::SourceLocked(self.state.as_str()));
        }
        let (trace, audio) = match content {
            Some(content) => (Some(content.trace), Some(content.audio)),
            None => (None, None),
        };
        self.editor.set_src(trace)?;
        self.audio.set_src(audio)?;
        self.emit(ReplayerEvent::SrcChanged);
        Ok(())
    }

    fn handle_audio_event(&mut self, event: AudioEvent) -> Result<()> {
        tracing::trace!(?event, "audio event");
        match event {
            AudioEvent::Waiting | AudioEvent::Stalled => self.editor.pause(),
            AudioEvent::Pause => {
                // Stale if the audio was resumed before this poll
                if !self.audio.output().is_playing() {
                    self.editor.pause();
                    if self.state == ReplayerState::Playing {
                        self.set_state(ReplayerState::Paused);
                    }
                }
            }
            AudioEvent::Playing => {
                if self.state == ReplayerState::Playing {
                    self.follow_audio()?;
                }
            }
            AudioEvent::TimeUpdate => {
                if self.state == ReplayerState::Playing {
                    self.correct_drift()?;
                }
            }
            AudioEvent::Ended => {
                self.editor.pause();
                self.audio.set_current_time(0.0);
                if self.editor.src().is_some() {
                    self.editor.set_current_time(0.0)?;
                    self.editor.sync()?;
                }
                self.set_state(ReplayerState::Paused);
                self.emit(ReplayerEvent::Ended);
            }
        }
        Ok(())
    }

    /// Seek the editor to the audio position and start it.
    fn follow_audio(&mut self) -> Result<()> {
        if self.editor.state() == ReplayerState::Playing {
            return Ok(());
        }
        let target = self.audio.current_time().clamp(0.0, self.editor.duration());
        self.editor.set_current_time(target)?;
        self.editor.play()
    }

    fn correct_drift(&mut self) -> Result<()> {
        let audio_time = self.audio.current_time();
        let drift = (self.editor.current_time() - audio_time).abs();
        if drift > self.config.drift_tolerance_secs {
            let target = audio_time.clamp(0.0, self.editor.duration());
            tracing::warn!(drift_secs = drift, audio_secs = audio_time, "editor drifted from audio, correcting");
            self.editor.set_current_time(target)?;
        }
        Ok(())
    }

    fn check_durations(&self, clip: &AudioClip, source: &T::Source) -> Result<()> {
        let tolerance_ms = self.config.duration_tolerance_ms;
        for (label, editor_ms) in T::trace_durations(source) {
            if (editor_ms - clip.duration_ms).abs() > tolerance_ms {
                tracing::warn!(
                    editor = %label,
                    editor_ms,
                    audio_ms = clip.duration_ms,
                    "recordings differ in length, discarding"
                );
                return Err(Error::DurationMismatch {
                    editor_ms,
                    audio_ms: clip.duration_ms,
                    tolerance_ms,
                });
            }
        }
        Ok(())
    }

    fn discard(&mut self) {
        if let Err(err) = self.editor.set_src(None) {
            tracing::warn!(%err, "editor failed to unload");
        }
        self.audio.discard();
    }

    fn expect(&self, expected: ReplayerState) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                expected: expected.as_str(),
                found: self.state.as_str(),
            });
        }
        Ok(())
    }

    fn set_state(&mut self, state: ReplayerState) {
        if state == self.state {
            return;
        }
        tracing::debug!(from = self.state.as_str(), to = state.as_str(), "record-replayer state");
        self.state = state;
        for listener in &mut self.state_listeners {
            listener(state);
        }
    }

    fn emit(&mut self, event: ReplayerEvent) {
        for listener in &mut self.event_listeners {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_replayer::EditorRecordReplayer;
    use crate::testing::{pump, HeadlessEditor, ScriptedMicrophone, ScriptedSpeaker};
    use parking_lot::Mutex;
    use rewind_core::surface::shared;
    use rewind_core::{EditorLocation, EditorSurface, ManualClock, SharedSurface};
    use std::sync::Arc;

    type Synced = RecordReplayer<EditorRecordReplayer<HeadlessEditor>, ScriptedMicrophone, ScriptedSpeaker>;

    fn synced(editor_clock: &ManualClock, audio_clock: &ManualClock) -> (Synced, SharedSurface<HeadlessEditor>) {
        let surface = shared(HeadlessEditor::new("hello"));
        let editor = EditorRecordReplayer::new(Arc::clone(&surface), editor_clock.shared());
        let synced = RecordReplayer::new(
            editor,
            ScriptedMicrophone::new(audio_clock.shared()),
            ScriptedSpeaker::new(audio_clock.shared()),
            audio_clock.shared(),
        );
        (synced, surface)
    }

    /// Two seconds with " world" typed at one second.
    async fn recorded(clock: &ManualClock) -> (Synced, SharedSurface<HeadlessEditor>) {
        let (mut synced, surface) = synced(clock, clock);
        synced.record().await.unwrap();
        clock.advance(1_000);
        surface.lock().insert(EditorLocation::new(0, 5), " world");
        pump(synced.editor_mut().recorder_mut()).unwrap();
        clock.advance(1_000);
        synced.stop().await.unwrap();
        (synced, surface)
    }

    #[tokio::test]
    async fn test_record_and_stop() {
        let clock = ManualClock::at_epoch_millis(0);
        let (mut synced, _) = synced(&clock, &clock);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        synced.add_event_listener(move |event| sink.lock().push(event));

        synced.record().await.unwrap();
        assert_eq!(synced.state(), ReplayerState::Recording);
        assert!(matches!(synced.src(), Err(Error::SourceLocked("recording"))));
        assert!(matches!(synced.set_src(None), Err(Error::SourceLocked("recording"))));

        clock.advance(3_000);
        let content = synced.stop().await.unwrap();
        assert_eq!(content.trace.duration_ms(), 3_000);
        assert_eq!(content.audio.duration_ms, 3_000);
        assert_eq!(synced.duration(), 3.0);
        assert_eq!(
            *events.lock(),
            vec![ReplayerEvent::StartedRecording, ReplayerEvent::SrcChanged]
        );
    }

    #[tokio::test]
    async fn test_duration_mismatch_discards() {
        let editor_clock = ManualClock::at_epoch_millis(0);
        let audio_clock = ManualClock::at_epoch_millis(0);
        let (mut synced, _) = synced(&editor_clock, &audio_clock);

        synced.record().await.unwrap();
        editor_clock.advance(5_000);
        audio_clock.advance(5_200);
        let err = synced.stop().await.unwrap_err();
        assert!(matches!(
            err,
            Error::DurationMismatch {
                editor_ms: 5_000,
                audio_ms: 5_200,
                tolerance_ms: 100
            }
        ));
        assert_eq!(synced.state(), ReplayerState::Paused);
        assert!(synced.src().unwrap().is_none());
        assert_eq!(synced.audio().state(), AudioState::Empty);
    }

    #[tokio::test]
    async fn test_within_tolerance_accepted() {
        let editor_clock = ManualClock::at_epoch_millis(0);
        let audio_clock = ManualClock::at_epoch_millis(0);
        let (mut synced, _) = synced(&editor_clock, &audio_clock);

        synced.record().await.unwrap();
        editor_clock.advance(5_000);
        audio_clock.advance(5_080);
        synced.stop().await.unwrap();
        assert!(synced.src().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_editor_follows_audio() {
        let clock = ManualClock::at_epoch_millis(0);
        let (mut synced, surface) = recorded(&clock).await;

        synced.play().await.unwrap();
        assert_eq!(surface.lock().text(), "hello");
        assert!(synced.next_deadline().is_some());

        clock.advance(1_200);
        synced.tick().unwrap();
        assert_eq!(surface.lock().text(), "hello world");

        synced.pause().unwrap();
        assert_eq!(synced.editor().state(), ReplayerState::Paused);
        assert!(matches!(synced.pause(), Err(Error::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_drift_corrected_to_audio() {
        let clock = ManualClock::at_epoch_millis(0);
        let (mut synced, _) = recorded(&clock).await;
        synced.play().await.unwrap();

        clock.advance(200);
        synced.audio_mut().output_mut().jump_to(1.5);
        synced.tick().unwrap();
        assert!((synced.editor().current_time() - 1.5).abs() < 1e-6);

        // Small drift is left alone
        synced.audio_mut().output_mut().jump_to(1.55);
        synced.tick().unwrap();
        assert!((synced.editor().current_time() - 1.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_stall_pauses_editor_until_audio_resumes() {
        let clock = ManualClock::at_epoch_millis(0);
        let (mut synced, _) = recorded(&clock).await;
        synced.play().await.unwrap();
        clock.advance(500);
        synced.tick().unwrap();

        synced.audio_mut().output_mut().stall();
        synced.tick().unwrap();
        assert_eq!(synced.editor().state(), ReplayerState::Paused);
        assert_eq!(synced.state(), ReplayerState::Playing);

        clock.advance(300);
        synced.audio_mut().output_mut().resume();
        synced.tick().unwrap();
        assert_eq!(synced.editor().state(), ReplayerState::Playing);
        assert!((synced.editor().current_time() - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_audio_end_rewinds() {
        let clock = ManualClock::at_epoch_millis(0);
        let (mut synced, surface) = recorded(&clock).await;
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        synced.add_event_listener(move |event| sink.lock().push(event));

        synced.play().await.unwrap();
        clock.advance(2_500);
        synced.tick().unwrap();

        assert_eq!(synced.state(), ReplayerState::Paused);
        assert_eq!(synced.current_time(), 0.0);
        assert_eq!(synced.editor().current_time(), 0.0);
        assert_eq!(surface.lock().text(), "hello");
        assert_eq!(events.lock().last(), Some(&ReplayerEvent::Ended));
    }

    #[tokio::test]
    async fn test_seek_and_rate_broadcast() {
        let clock = ManualClock::at_epoch_millis(0);
        let (mut synced, surface) = recorded(&clock).await;

        synced.set_current_time(1.5).unwrap();
        assert_eq!(surface.lock().text(), "hello world");
        assert_eq!(synced.audio().current_time(), 1.5);
        assert!(matches!(synced.set_current_time(2.5), Err(Error::OutOfRange { .. })));
        assert!(matches!(synced.set_percent(101.0), Err(Error::OutOfRange { .. })));

        synced.set_playback_rate(2.0).unwrap();
        assert_eq!(synced.audio().playback_rate(), 2.0);
        assert_eq!(synced.editor().playback_rate(), 2.0);
        assert!(matches!(synced.set_playback_rate(-1.0), Err(Error::InvalidPlaybackRate(_))));
    }
}
