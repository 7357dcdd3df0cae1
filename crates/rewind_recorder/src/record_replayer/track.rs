//! One editor surface paired with its recorder and player.

use super::{EditorTrack, ReplayerState};
use crate::error::{Error, Result};
use crate::recorder::Recorder;
use crate::replay::Player;
use rewind_core::{
    EditorSurface, PlayerConfig, RecorderOptions, SharedClock, SharedSurface, SurfaceEvent, Timestamp, Trace,
};
use std::sync::Arc;

type StateListener = Box<dyn FnMut(ReplayerState)>;

/// One editing recorder and one player.
///
/// A finished recording is loaded into the player. The player may drive a
/// separate replay surface so a recording can be watched without touching
/// the editor it came from.
pub struct EditorRecordReplayer<S: EditorSurface> {
    recorder: Recorder<S>,
    player: Player<S>,
    state: ReplayerState,
    listeners: Vec<StateListener>,
}

impl<S: EditorSurface> EditorRecordReplayer<S> {
    /// Record and replay on the same surface.
    pub fn new(surface: SharedSurface<S>, clock: SharedClock) -> Self {
        Self::with_replay_surface(
            Arc::clone(&surface),
            surface,
            clock,
            RecorderOptions::default(),
            PlayerConfig::default(),
        )
    }

    pub fn with_replay_surface(
        surface: SharedSurface<S>,
        replay_surface: SharedSurface<S>,
        clock: SharedClock,
        options: RecorderOptions,
        config: PlayerConfig,
    ) -> Self {
        Self {
            recorder: Recorder::with_options(surface, Arc::clone(&clock), options),
            player: Player::new(replay_surface, clock, config),
            state: ReplayerState::Paused,
            listeners: Vec::new(),
        }
    }

    pub fn recorder(&self) -> &Recorder<S> {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut Recorder<S> {
        &mut self.recorder
    }

    pub fn player(&self) -> &Player<S> {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player<S> {
        &mut self.player
    }

    /// Forward a notification from the recorded surface.
    pub fn handle(&mut self, event: &SurfaceEvent) -> Result<()> {
        self.recorder.handle(event)
    }

    pub fn add_state_listener(&mut self, listener: impl FnMut(ReplayerState) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn percent(&self) -> f64 {
        self.player.percent()
    }

    pub fn set_percent(&mut self, percent: f64) -> Result<()> {
        self.player.set_percent(percent)
    }

    fn set_state(&mut self, state: ReplayerState) {
        if state == self.state {
            return;
        }
        tracing::debug!(from = self.state.as_str(), to = state.as_str(), "editor track state");
        self.state = state;
        for listener in &mut self.listeners {
            listener(state);
        }
    }

    /// The player pauses itself at the end of the trace.
    /// Playback ends or fails inside the player.
    fn follow_player(&mut self) {
        if self.state == ReplayerState::Playing && !self.player.is_playing() {
            self.set_state(ReplayerState::Paused);
        }
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
}

impl<S: EditorSurface> EditorTrack for EditorRecordReplayer<S> {
    type Source = Arc<Trace>;

    fn state(&self) -> ReplayerState {
        self.state
    }

    fn record(&mut self) -> Result<()> {
        self.expect(ReplayerState::Paused)?;
        self.recorder.start()?;
        self.set_state(ReplayerState::Recording);
        Ok(())
    }

    fn stop(&mut self) -> Result<Arc<Trace>> {
        if self.state != ReplayerState::Recording {
            return Err(Error::NotRecording);
        }
        let trace = self.recorder.stop();
        self.set_state(ReplayerState::Paused);
        let trace = trace?;
        self.player.load(Some(Arc::clone(&trace)))?;
        Ok(trace)
    }

    fn play(&mut self) -> Result<()> {
        self.expect(ReplayerState::Paused)?;
        self.player.play()?;
        self.set_state(ReplayerState::Playing);
        self.follow_player();
        Ok(())
    }

    fn pause(&mut self) {
        if self.state == ReplayerState::Playing {
            self.player.pause();
            self.set_state(ReplayerState::Paused);
        }
    }

    fn sync(&mut self) -> Result<()> {
        let result = self.player.sync().map(|_| ());
        self.follow_player();
        result
    }

    fn tick(&mut self) -> Result<()> {
        match self.state {
            ReplayerState::Recording => self.recorder.tick(),
            ReplayerState::Playing => {
                let result = self.player.tick();
                self.follow_player();
                result
            }
            ReplayerState::Paused => Ok(()),
        }
    }

    fn next_deadline(&self) -> Option<Timestamp> {
        match self.state {
            ReplayerState::Recording => self.recorder.next_deadline(),
            ReplayerState::Playing => self.player.next_deadline(),
            ReplayerState::Paused => None,
        }
    }

    fn current_time(&self) -> f64 {
        self.player.current_time()
    }

    fn set_current_time(&mut self, secs: f64) -> Result<()> {
        let result = self.player.set_current_time(secs);
        self.follow_player();
        result
    }

    fn duration(&self) -> f64 {
        self.player.duration()
    }

    fn playback_rate(&self) -> f64 {
        self.player.playback_rate()
    }

    fn set_playback_rate(&mut self, rate: f64) -> Result<()> {
        let result = self.player.set_playback_rate(rate);
        self.follow_player();
        result
    }

    fn src(&self) -> Option<Arc<Trace>> {
        self.player.trace().cloned()
    }

    fn set_src(&mut self, src: Option<Arc<Trace>>) -> Result<()> {
        match self.state {
            ReplayerState::Playing | ReplayerState::Recording => Err(Error::SourceLocked(self.state.as_str())),
            ReplayerState::Paused => self.player.load(src),
        }
    }

    fn trace_durations(source: &Arc<Trace>) -> Vec<(String, i64)> {
        vec![(source.session_name().to_string(), source.duration_ms())]
    }
}
