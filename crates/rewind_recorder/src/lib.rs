//! Rewind Recorder
//!
//! Records editing sessions into traces and replays them:
//!
//! - **Recorder**: turns surface notifications into a checkpointed trace
//! - **Player**: applies a trace back onto a surface on a virtual clock
//! - **Record-replayers**: one state machine over recording and playback,
//!   for one editor, several editors, or editors slaved to audio
//! - **Driver**: a tokio loop that wakes components at their deadlines
//!
//! Nothing here spawns threads or timers. Components expose
//! `next_deadline()`/`tick()` and the host, or [`drive`], calls them.
//!
//! # Example
//!
//! ```rust
//! use rewind_core::surface::shared;
//! use rewind_core::{EditorLocation, EditorSurface, ManualClock, PlayerConfig};
//! use rewind_recorder::testing::{pump, HeadlessEditor};
//! use rewind_recorder::{Player, Recorder};
//!
//! let clock = ManualClock::at_epoch_millis(0);
//! let mut recorder = Recorder::new(shared(HeadlessEditor::new("hello")), clock.shared());
//! recorder.start().unwrap();
//! clock.advance(1_000);
//! recorder.surface().lock().insert(EditorLocation::new(0, 5), " world");
//! pump(&mut recorder).unwrap();
//! clock.advance(1_000);
//! let trace = recorder.stop().unwrap();
//!
//! let replay = shared(HeadlessEditor::new(""));
//! let mut player = Player::new(replay.clone(), clock.shared(), PlayerConfig::default());
//! player.load(Some(trace)).unwrap();
//! player.set_current_time(1.5).unwrap();
//! player.sync().unwrap();
//! assert_eq!(replay.lock().text(), "hello world");
//! ```

pub mod audio;
pub mod driver;
pub mod error;
pub mod record_replayer;
mod recorder;
pub mod replay;
mod streamer;
pub mod testing;
mod throttle;

pub use audio::{
    AudioClip, AudioError, AudioEvent, AudioInput, AudioOutput, AudioRecordReplayer, AudioRecorder, AudioState,
};
pub use driver::{drive, drive_for, Drivable};
pub use error::{Error, Result};
pub use record_replayer::{
    Content, EditorRecordReplayer, EditorTrack, MultiEditorRecordReplayer, RecordReplayer, ReplayerEvent,
    ReplayerState,
};
pub use recorder::{Recorder, RecorderState};
pub use replay::{Player, PlayerEvent, PlayerState};
pub use streamer::{snapshot, Streamer};
