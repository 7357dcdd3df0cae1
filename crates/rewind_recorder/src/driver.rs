//! Async driving of timed components.
//!
//! Recorders, players and record-replayers never sleep on their own. Each
//! reports its next wake-up through [`Drivable::next_deadline`] and does
//! its due work in [`Drivable::tick`]. [`drive`] turns that into a tokio
//! task that sleeps until each deadline.

use crate::audio::{AudioInput, AudioOutput};
use crate::error::Result;
use crate::record_replayer::{EditorRecordReplayer, EditorTrack, MultiEditorRecordReplayer, RecordReplayer};
use crate::recorder::Recorder;
use crate::replay::Player;
use rewind_core::{Clock, EditorSurface, Timestamp};
use std::time::Duration;

/// A component with cooperative timers.
pub trait Drivable {
    /// When `tick` next has work, or `None` when idle.
    fn next_deadline(&self) -> Option<Timestamp>;
    fn tick(&mut self) -> Result<()>;
}

impl<S: EditorSurface> Drivable for Recorder<S> {
    fn next_deadline(&self) -> Option<Timestamp> {
        Recorder::next_deadline(self)
    }

    fn tick(&mut self) -> Result<()> {
        Recorder::tick(self)
    }
}

impl<S: EditorSurface> Drivable for Player<S> {
    fn next_deadline(&self) -> Option<Timestamp> {
        Player::next_deadline(self)
    }

    fn tick(&mut self) -> Result<()> {
        Player::tick(self)
    }
}

impl<S: EditorSurface> Drivable for EditorRecordReplayer<S> {
    fn next_deadline(&self) -> Option<Timestamp> {
        EditorTrack::next_deadline(self)
    }

    fn tick(&mut self) -> Result<()> {
        EditorTrack::tick(self)
    }
}

impl<S: EditorSurface> Drivable for MultiEditorRecordReplayer<S> {
    fn next_deadline(&self) -> Option<Timestamp> {
        EditorTrack::next_deadline(self)
    }

    fn tick(&mut self) -> Result<()> {
        EditorTrack::tick(self)
    }
}

impl<T: EditorTrack, I: AudioInput, O: AudioOutput> Drivable for RecordReplayer<T, I, O> {
    fn next_deadline(&self) -> Option<Timestamp> {
        RecordReplayer::next_deadline(self)
    }

    fn tick(&mut self) -> Result<()> {
        RecordReplayer::tick(self)
    }
}

/// Tick `target` at each of its deadlines until it goes idle.
pub async fn drive<D: Drivable + ?Sized>(clock: &dyn Clock, target: &mut D) -> Result<()> {
    while let Some(deadline) = target.next_deadline() {
        // Negative waits fail conversion and mean the deadline has passed
        if let Ok(wait) = (deadline - clock.now()).to_std() {
            tokio::time::sleep(wait).await;
        }
        target.tick()?;
    }
    tracing::trace!("drive finished, target idle");
    Ok(())
}

/// Like [`drive`], giving up after `limit`. Returns whether the target
/// went idle in time.
pub async fn drive_for<D: Drivable + ?Sized>(clock: &dyn Clock, target: &mut D, limit: Duration) -> Result<bool> {
    match tokio::time::timeout(limit, drive(clock, target)).await {
        Ok(result) => result.map(|()| true),
        Err(_) => {
            tracing::debug!(limit_ms = limit.as_millis() as u64, "drive timed out");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pump, HeadlessEditor};
    use rewind_core::surface::shared;
    use rewind_core::{EditorLocation, ManualClock, PlayerConfig, SystemClock};
    use std::sync::Arc;

    fn recorded_trace() -> Arc<rewind_core::Trace> {
        let clock = ManualClock::at_epoch_millis(0);
        let mut recorder = Recorder::new(shared(HeadlessEditor::new("fn")), clock.shared());
        recorder.start().unwrap();
        clock.advance(40);
        recorder.surface().lock().insert(EditorLocation::new(0, 2), " main");
        pump(&mut recorder).unwrap();
        clock.advance(40);
        recorder.stop().unwrap()
    }

    #[tokio::test]
    async fn test_drive_player_to_end() {
        let clock: rewind_core::SharedClock = Arc::new(SystemClock);
        let surface = shared(HeadlessEditor::new(""));
        let mut player = Player::new(Arc::clone(&surface), Arc::clone(&clock), PlayerConfig::default());
        player.load(Some(recorded_trace())).unwrap();
        player.play().unwrap();

        drive(clock.as_ref(), &mut player).await.unwrap();
        assert!(!player.is_playing());
        assert_eq!(surface.lock().text(), "fn main");
    }

    #[tokio::test]
    async fn test_drive_for_gives_up() {
        let clock: rewind_core::SharedClock = Arc::new(SystemClock);
        let mut player = Player::new(shared(HeadlessEditor::new("")), Arc::clone(&clock), PlayerConfig {
            playback_rate: 0.01,
            ..PlayerConfig::default()
        });
        player.load(Some(recorded_trace())).unwrap();
        player.play().unwrap();

        let finished = drive_for(clock.as_ref(), &mut player, Duration::from_millis(30)).await.unwrap();
        assert!(!finished);
        assert!(player.is_playing());
    }

    #[tokio::test]
    async fn test_idle_target_returns_immediately() {
        let clock = ManualClock::at_epoch_millis(0);
        let mut recorder = Recorder::new(shared(HeadlessEditor::new("")), clock.shared());
        drive(&clock, &mut recorder).await.unwrap();
    }
}
