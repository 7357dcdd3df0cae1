//! Trace player.
//!
//! Applies each record of a trace to the surface when the virtual clock
//! reaches its offset. The player never sleeps: [`Player::sync`] applies
//! every record that is due and reports how long until the next one, and
//! the host (or [`crate::driver`]) calls [`Player::tick`] at
//! [`Player::next_deadline`].

use super::{PlaybackClock, PlaybackIndex};
use crate::error::{Error, Result};
use chrono::Duration;
use rewind_core::{
    apply_record, ApplyMode, CursorStyle, EditorSurface, PlayerConfig, Record, SharedClock, SharedSurface,
    Timestamp, Trace,
};
use std::sync::Arc;

/// Records due within this many milliseconds of the clock are applied.
const DUE_EPSILON_MS: f64 = 1e-6;

/// Current state of the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    /// No trace loaded.
    Idle,
    /// Trace loaded, clock stopped.
    Paused,
    /// Clock running, a wake-up is pending.
    Playing,
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerState::Idle => "idle",
            PlayerState::Paused => "paused",
            PlayerState::Playing => "playing",
        }
    }
}

/// Notifications from the player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Record at this index was applied
    Record(usize),
    /// Playback reached the end of the trace
    Ended,
}

type RecordFilter = Box<dyn FnMut(&Record) -> bool>;
type PlayerListener = Box<dyn FnMut(&PlayerEvent)>;

/// Replays a [`Trace`] onto an editing surface.
pub struct Player<S: EditorSurface> {
    surface: SharedSurface<S>,
    clock: SharedClock,
    config: PlayerConfig,
    trace: Option<Arc<Trace>>,
    index: PlaybackIndex,
    /// First record not yet applied.
    current_index: usize,
    playback: PlaybackClock,
    state: PlayerState,
    wake_at: Option<Timestamp>,
    /// Cursor presentation to restore on pause.
    saved_style: CursorStyle,
    filter: Option<RecordFilter>,
    listeners: Vec<PlayerListener>,
}

impl<S: EditorSurface> Player<S> {
    /// Create a player. The surface's cursor style is captured here and
    /// restored on every pause.
    pub fn new(surface: SharedSurface<S>, clock: SharedClock, config: PlayerConfig) -> Self {
        let saved_style = surface.lock().cursor_style();
        let mut playback = PlaybackClock::default();
        if valid_rate(config.playback_rate) {
            playback.set_rate(clock.now(), config.playback_rate);
        } else {
            tracing::warn!(rate = config.playback_rate, "ignoring bad initial playback rate");
        }
        Self {
            surface,
            clock,
            config,
            trace: None,
            index: PlaybackIndex::default(),
            current_index: 0,
            playback,
            state: PlayerState::Idle,
            wake_at: None,
            saved_style,
            filter: None,
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }

    pub fn trace(&self) -> Option<&Arc<Trace>> {
        self.trace.as_ref()
    }

    pub fn surface(&self) -> &SharedSurface<S> {
        &self.surface
    }

    pub fn index(&self) -> &PlaybackIndex {
        &self.index
    }

    /// Index of the first record not yet applied.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Load a trace, or unload with `None`. Rejected while playing.
    ///
    /// Traces with named sessions recreate each session on the surface and
    /// switch to the session active when recording started.
    pub fn load(&mut self, trace: Option<Arc<Trace>>) -> Result<()> {
        if self.is_playing() {
            return Err(Error::InvalidState {
                expected: PlayerState::Paused.as_str(),
                found: self.state.as_str(),
            });
        }

        let Some(trace) = trace else {
            self.trace = None;
            self.index = PlaybackIndex::default();
            self.current_index = 0;
            self.playback.reset();
            self.wake_at = None;
            self.state = PlayerState::Idle;
            return Ok(());
        };

        if trace.has_named_sessions() {
            let mut surface = self.surface.lock();
            for info in trace.session_info() {
                surface.create_session(info);
            }
            if !trace.session_name().is_empty() {
                surface.switch_session(trace.session_name())?;
            }
        }

        let rate = self.playback.rate();
        self.index = PlaybackIndex::build(&trace);
        self.playback = PlaybackClock::new(trace.duration_ms() as f64);
        self.playback.set_rate(self.clock.now(), rate);
        self.current_index = 0;
        self.wake_at = None;
        self.state = PlayerState::Paused;
        tracing::debug!(
            records = trace.len(),
            duration_ms = trace.duration_ms(),
            "trace loaded"
        );
        self.trace = Some(trace);
        Ok(())
    }

    /// Start or resume playback. Playback at the end restarts from zero.
    pub fn play(&mut self) -> Result<()> {
        if self.trace.is_none() {
            return Err(Error::NoTrace);
        }
        if self.is_playing() {
            return Ok(());
        }

        let now = self.clock.now();
        if self.playback.is_at_end(now) {
            self.seek_to(now, 0.0)?;
        }
        self.surface.lock().set_cursor_style(CursorStyle::PLAYING);
        self.playback.play(now);
        self.state = PlayerState::Playing;
        tracing::debug!(position_ms = self.playback.position(now), "playing");
        self.advance(now)
    }

    /// Pause playback and restore the cursor style.
    pub fn pause(&mut self) {
        self.pause_with(true);
    }

    fn pause_with(&mut self, restore_style: bool) {
        if self.is_playing() {
            let now = self.clock.now();
            self.playback.pause(now);
            self.wake_at = None;
            self.state = PlayerState::Paused;
            tracing::debug!(position_ms = self.playback.position(now), "paused");
        }
        if restore_style {
            self.surface.lock().set_cursor_style(self.saved_style);
        }
    }

    /// Apply every record that is due and return the wait in milliseconds
    /// until the next one, or `None` at the end of the trace.
    pub fn sync(&mut self) -> Result<Option<f64>> {
        if self.trace.is_none() {
            return Err(Error::NoTrace);
        }
        let now = self.clock.now();
        if self.is_playing() {
            self.advance(now)?;
            return Ok(self.wake_at.map(|wake| rewind_core::time::elapsed_millis(now, wake)));
        }
        self.sync_at(now)
    }

    /// Fire the pending wake-up if it is due.
    pub fn tick(&mut self) -> Result<()> {
        if !self.is_playing() {
            return Ok(());
        }
        let now = self.clock.now();
        match self.wake_at {
            Some(wake) if wake <= now => self.advance(now),
            _ => Ok(()),
        }
    }

    /// When the next wake-up is due.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        if self.is_playing() {
            self.wake_at
        } else {
            None
        }
    }

    /// Trace duration in seconds.
    pub fn duration(&self) -> f64 {
        self.trace
            .as_ref()
            .map_or(0.0, |trace| trace.duration_ms() as f64 / 1000.0)
    }

    /// Simulated offset in seconds.
    pub fn current_time(&self) -> f64 {
        self.playback.position(self.clock.now()) / 1000.0
    }

    /// Seek to `secs`, which must lie within `[0, duration]`.
    ///
    /// The latest checkpoint at or before the target becomes the next
    /// record to apply.
    pub fn set_current_time(&mut self, secs: f64) -> Result<()> {
        let Some(trace) = &self.trace else {
            return Err(Error::NoTrace);
        };
        let duration_ms = trace.duration_ms() as f64;
        let duration_secs = duration_ms / 1000.0;
        if !secs.is_finite() || secs < 0.0 || secs > duration_secs {
            return Err(Error::OutOfRange {
                target_secs: secs,
                duration_secs,
            });
        }

        let now = self.clock.now();
        self.seek_to(now, (secs * 1000.0).min(duration_ms))?;
        if self.is_playing() {
            self.advance(now)?;
        }
        Ok(())
    }

    /// Position as a percentage of the duration.
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
        self.playback.rate()
    }

    /// Change the rate without moving the simulated offset.
    pub fn set_playback_rate(&mut self, rate: f64) -> Result<()> {
        if !valid_rate(rate) {
            return Err(Error::InvalidPlaybackRate(rate));
        }
        self.config.playback_rate = rate;
        if self.is_playing() {
            self.pause_with(false);
            self.playback.set_rate(self.clock.now(), rate);
            self.play()
        } else {
            self.playback.set_rate(self.clock.now(), rate);
            Ok(())
        }
    }

    pub fn scroll_to_cursor(&self) -> bool {
        self.config.scroll_to_cursor
    }

    /// Follow the cursor instead of replaying recorded scroll offsets.
    pub fn set_scroll_to_cursor(&mut self, scroll_to_cursor: bool) {
        self.config.scroll_to_cursor = scroll_to_cursor;
    }

    /// Intercept records before they are applied.
    ///
    /// Returning `false` skips the record; the player still moves past it.
    pub fn set_filter(&mut self, filter: impl FnMut(&Record) -> bool + 'static) {
        self.filter = Some(Box::new(filter));
    }

    pub fn clear_filter(&mut self) {
        self.filter = None;
    }

    pub fn add_listener(&mut self, listener: impl FnMut(&PlayerEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn seek_to(&mut self, now: Timestamp, target_ms: f64) -> Result<()> {
        self.current_index = self.index.seek(target_ms)?;
        self.playback.seek(now, target_ms);
        tracing::debug!(target_ms, index = self.current_index, "seeked");
        Ok(())
    }

    /// Sync and schedule the next wake-up, or finish at the end.
    ///
    /// A failure pauses playback, so a playing player always has a wake-up.
    fn advance(&mut self, now: Timestamp) -> Result<()> {
        self.wake_at = None;
        let wait = match self.sync_at(now) {
            Ok(wait) => wait,
            Err(err) => {
                tracing::warn!(index = self.current_index, error = %err, "playback stopped");
                self.pause_with(true);
                return Err(err);
            }
        };
        match wait {
            Some(wait) => {
                let delay = Duration::microseconds((wait * 1000.0).ceil() as i64);
                let Some(wake) = now.checked_add_signed(delay) else {
                    self.pause_with(true);
                    return Err(Error::InvalidPlaybackRate(self.playback.rate()));
                };
                self.wake_at = Some(wake);
            }
            None => self.finish(now),
        }
        Ok(())
    }

    fn finish(&mut self, now: Timestamp) {
        self.playback.pause(now);
        self.playback.seek(now, self.playback.duration_ms());
        self.wake_at = None;
        self.state = PlayerState::Paused;
        self.surface.lock().set_cursor_style(self.saved_style);
        tracing::debug!("playback ended");
        self.emit(PlayerEvent::Ended);
    }

    fn sync_at(&mut self, now: Timestamp) -> Result<Option<f64>> {
        let Some(trace) = self.trace.clone() else {
            return Err(Error::NoTrace);
        };
        let target = self.playback.position(now);
        let rate = self.playback.rate();

        while let Some(entry) = self.index.entries().get(self.current_index).copied() {
            let offset = entry.offset_ms as f64;
            if offset > target + DUE_EPSILON_MS {
                return Ok(Some((offset - target) / rate));
            }

            let index = self.current_index;
            self.current_index += 1;
            let record = &trace.records()[index];
            let apply = self.filter.as_mut().map_or(true, |filter| filter(record));
            if apply {
                self.apply(record)?;
                self.emit(PlayerEvent::Record(index));
            }
        }
        Ok(None)
    }

    fn apply(&self, record: &Record) -> Result<()> {
        let mut surface = self.surface.lock();
        if let Record::Complete(complete) = record {
            if let Some(name) = &complete.session_name {
                if surface.active_session() != *name {
                    let known = surface.session_names().iter().any(|existing| existing == name);
                    if !known {
                        if let Some(info) = complete.session_info.iter().find(|info| info.name == *name) {
                            surface.create_session(info);
                        }
                    }
                    surface.switch_session(name)?;
                }
            }
        }
        let mode = ApplyMode {
            scroll_to_cursor: self.config.scroll_to_cursor,
        };
        apply_record(&mut *surface, record, mode)?;
        tracing::trace!(kind = %record.kind(), "record applied");
        Ok(())
    }

    fn emit(&mut self, event: PlayerEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }
}

/// Slowest accepted playback rate.
pub const MIN_PLAYBACK_RATE: f64 = 1e-3;

pub(crate) fn valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate >= MIN_PLAYBACK_RATE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::HeadlessEditor;
    use rewind_core::surface::shared;
    use rewind_core::time::from_epoch_millis;
    use rewind_core::{
        CheckpointReason, Complete, CursorChange, Delta, EditorLocation, ManualClock, ScrollPosition, Selection,
        TextEdit, WindowSize,
    };

    const START: i64 = 1_700_000_000_000;

    fn complete(millis: i64, value: &str, cursor: EditorLocation) -> Record {
        Record::Complete(Complete {
            timestamp: from_epoch_millis(START + millis),
            focused: true,
            value: value.to_string(),
            selection: Selection::caret(cursor),
            cursor,
            scroll: ScrollPosition::default(),
            window: WindowSize::default(),
            reason: CheckpointReason::Timer,
            session_name: None,
            session_info: Vec::new(),
        })
    }

    fn cursor(millis: i64, column: usize) -> Record {
        Record::CursorChange(CursorChange {
            timestamp: from_epoch_millis(START + millis),
            focused: true,
            location: EditorLocation::new(0, column),
        })
    }

    fn insert(millis: i64, column: usize, text: &str) -> Record {
        Record::Delta(Delta {
            timestamp: from_epoch_millis(START + millis),
            focused: true,
            edit: TextEdit::insert(EditorLocation::new(0, column), text),
            id: None,
        })
    }

    /// 10 seconds: "ab" typed at 1s and 2s, checkpoints every 5s.
    fn trace() -> Arc<Trace> {
        Arc::new(
            Trace::from_records(vec![
                complete(0, "", EditorLocation::new(0, 0)),
                insert(1_000, 0, "a"),
                insert(2_000, 1, "b"),
                complete(5_000, "ab", EditorLocation::new(0, 2)),
                cursor(7_000, 0),
                complete(10_000, "ab", EditorLocation::new(0, 0)),
            ])
            .unwrap(),
        )
    }

    fn player() -> (Player<HeadlessEditor>, ManualClock) {
        let clock = ManualClock::at_epoch_millis(0);
        let player = Player::new(shared(HeadlessEditor::new("")), clock.shared(), PlayerConfig::default());
        (player, clock)
    }

    fn text(player: &Player<HeadlessEditor>) -> String {
        player.surface().lock().text()
    }

    #[test]
    fn test_rejected_record_pauses_playback() {
        let (mut player, clock) = player();
        let bad = Record::Delta(Delta {
            timestamp: from_epoch_millis(START + 1_000),
            focused: true,
            edit: TextEdit::insert(EditorLocation::new(3, 9), "x"),
            id: None,
        });
        let trace = Trace::from_records(vec![
            complete(0, "", EditorLocation::new(0, 0)),
            bad,
            complete(5_000, "done", EditorLocation::new(0, 4)),
        ])
        .unwrap();
        player.load(Some(Arc::new(trace))).unwrap();
        player.play().unwrap();

        clock.advance(1_000);
        assert!(matches!(player.tick(), Err(Error::Surface(_))));
        assert_eq!(player.state(), PlayerState::Paused);
        assert_eq!(player.next_deadline(), None);

        clock.advance(10_000);
        assert!((player.current_time() - 1.0).abs() < 1e-3);

        player.play().unwrap();
        clock.advance(4_000);
        player.tick().unwrap();
        assert_eq!(text(&player), "done");
        assert_eq!(player.state(), PlayerState::Paused);
    }

    #[test]
    fn test_tiny_rate_rejected_while_playing() {
        let (mut player, clock) = player();
        player.load(Some(trace())).unwrap();
        player.play().unwrap();
        clock.advance(500);
        player.tick().unwrap();

        assert!(matches!(player.set_playback_rate(1e-15), Err(Error::InvalidPlaybackRate(_))));
        assert!(player.is_playing());
        assert_eq!(player.playback_rate(), 1.0);
        assert!((player.current_time() - 0.5).abs() < 1e-3);
        player.set_playback_rate(MIN_PLAYBACK_RATE).unwrap();
        assert!(player.next_deadline().is_some());
    }

    #[test]
    fn test_play_requires_trace() {
        let (mut player, _) = player();
        assert_eq!(player.state(), PlayerState::Idle);
        assert!(matches!(player.play(), Err(Error::NoTrace)));
        assert!(matches!(player.set_current_time(0.0), Err(Error::NoTrace)));
    }

    #[test]
    fn test_timed_application() {
        let (mut player, clock) = player();
        player.load(Some(trace())).unwrap();
        player.play().unwrap();
        assert_eq!(player.current_index(), 1);
        assert_eq!(player.next_deadline(), Some(from_epoch_millis(1_000)));

        clock.advance(1_000);
        player.tick().unwrap();
        assert_eq!(text(&player), "a");

        clock.advance(500);
        player.tick().unwrap();
        assert_eq!(text(&player), "a");

        clock.advance(500);
        player.tick().unwrap();
        assert_eq!(text(&player), "ab");
    }

    #[test]
    fn test_catch_up_after_delay() {
        let (mut player, clock) = player();
        player.load(Some(trace())).unwrap();
        player.play().unwrap();

        clock.advance(7_500);
        player.tick().unwrap();
        assert_eq!(player.current_index(), 5);
        assert_eq!(player.surface().lock().cursor(), EditorLocation::new(0, 0));
        assert_eq!(player.next_deadline(), Some(from_epoch_millis(10_000)));
    }

    #[test]
    fn test_end_pauses_and_emits() {
        let (mut player, clock) = player();
        let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        player.add_listener(move |event| sink.lock().push(event.clone()));

        player.load(Some(trace())).unwrap();
        player.play().unwrap();
        clock.advance(20_000);
        player.tick().unwrap();

        assert_eq!(player.state(), PlayerState::Paused);
        assert_eq!(player.current_time(), 10.0);
        assert_eq!(events.lock().last(), Some(&PlayerEvent::Ended));
        assert_eq!(player.next_deadline(), None);
    }

    #[test]
    fn test_seek_out_of_range() {
        let (mut player, _) = player();
        player.load(Some(trace())).unwrap();
        assert!(matches!(
            player.set_current_time(10.0005),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(player.set_current_time(-0.1), Err(Error::OutOfRange { .. })));
        player.set_current_time(10.0).unwrap();
    }

    #[test]
    fn test_seek_then_sync_restores_checkpoint() {
        let (mut player, _) = player();
        player.load(Some(trace())).unwrap();
        player.set_current_time(6.0).unwrap();
        assert_eq!(player.current_index(), 3);

        assert_eq!(player.sync().unwrap(), Some(1_000.0));
        assert_eq!(text(&player), "ab");
        assert_eq!(player.current_index(), 4);
    }

    #[test]
    fn test_rate_change_keeps_position() {
        let (mut player, clock) = player();
        player.load(Some(trace())).unwrap();
        player.play().unwrap();
        clock.advance(1_500);
        player.tick().unwrap();

        let before = player.current_time();
        let applied = player.current_index();
        player.set_playback_rate(2.0).unwrap();
        assert!((player.current_time() - before).abs() < 0.005);
        assert_eq!(player.current_index(), applied);
        assert_eq!(player.next_deadline(), Some(from_epoch_millis(1_750)));

        assert!(matches!(player.set_playback_rate(0.0), Err(Error::InvalidPlaybackRate(_))));
    }

    #[test]
    fn test_pause_restores_cursor_style() {
        let hidden = CursorStyle {
            visible: false,
            blinking: false,
            opacity: 0.5,
        };
        let surface = shared(HeadlessEditor::new(""));
        surface.lock().set_cursor_style(hidden);
        let clock = ManualClock::at_epoch_millis(0);
        let mut player = Player::new(surface, clock.shared(), PlayerConfig::default());

        player.load(Some(trace())).unwrap();
        player.play().unwrap();
        assert_eq!(player.surface().lock().cursor_style(), CursorStyle::PLAYING);
        player.pause();
        assert_eq!(player.surface().lock().cursor_style(), hidden);
        player.pause();
        assert_eq!(player.surface().lock().cursor_style(), hidden);
    }

    #[test]
    fn test_filter_vetoes_but_advances() {
        let (mut player, clock) = player();
        player.set_filter(|record| !matches!(record, Record::Delta(_)));
        player.load(Some(trace())).unwrap();
        player.play().unwrap();
        clock.advance(3_000);
        player.tick().unwrap();
        assert_eq!(text(&player), "");
        assert_eq!(player.current_index(), 3);
    }

    #[test]
    fn test_load_rejected_while_playing() {
        let (mut player, _) = player();
        player.load(Some(trace())).unwrap();
        player.play().unwrap();
        assert!(matches!(player.load(None), Err(Error::InvalidState { .. })));
        player.pause();
        player.load(None).unwrap();
        assert_eq!(player.state(), PlayerState::Idle);
    }
}
