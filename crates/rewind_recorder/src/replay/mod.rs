//! Playback engine for recorded traces.
//!
//! This module provides:
//! - `PlaybackClock` - Pausable, rate-scaled virtual clock
//! - `PlaybackIndex` - Record offsets and the per-second seek table
//! - `Player` - Catch-up playback of a trace onto an editing surface
//!
//! # Example
//!
//! ```ignore
//! use rewind_recorder::replay::Player;
//!
//! let mut player = Player::new(surface, clock, PlayerConfig::default());
//! player.load(Some(trace))?;
//! player.set_playback_rate(2.0)?;
//! player.play()?;
//!
//! // Host loop
//! while let Some(deadline) = player.next_deadline() {
//!     sleep_until(deadline);
//!     player.tick()?;
//! }
//! ```

mod clock;
mod index;
mod player;

pub use clock::PlaybackClock;
pub use index::{IndexEntry, PlaybackIndex};
pub(crate) use player::valid_rate;
pub use player::{Player, PlayerEvent, PlayerState, MIN_PLAYBACK_RATE};
