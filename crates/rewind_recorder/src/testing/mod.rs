//! Testing utilities for recorders and players.
//!
//! This module provides:
//! - `HeadlessEditor` - In-memory editing surface with simulated user input
//! - `ScriptedMicrophone` / `ScriptedSpeaker` - Audio devices on a manual clock
//! - `pump` - Forward queued surface notifications to a recorder
//!
//! # Example
//!
//! ```rust
//! use rewind_core::surface::shared;
//! use rewind_core::{EditorLocation, ManualClock};
//! use rewind_recorder::testing::{pump, HeadlessEditor};
//! use rewind_recorder::Recorder;
//!
//! let clock = ManualClock::at_epoch_millis(0);
//! let mut recorder = Recorder::new(shared(HeadlessEditor::new("hello")), clock.shared());
//! recorder.start().unwrap();
//!
//! clock.advance(1_000);
//! recorder.surface().lock().insert(EditorLocation::new(0, 5), " world");
//! pump(&mut recorder).unwrap();
//!
//! let trace = recorder.stop().unwrap();
//! assert_eq!(trace.duration_ms(), 1_000);
//! ```

mod audio;
mod headless;

pub use audio::{ScriptedMicrophone, ScriptedSpeaker};
pub use headless::{Document, HeadlessEditor, DEFAULT_MODE, DEFAULT_SESSION, DEFAULT_VIEWPORT};

use crate::error::Result;
use crate::recorder::Recorder;

/// Forward every queued notification of the recorder's surface.
pub fn pump(recorder: &mut Recorder<HeadlessEditor>) -> Result<()> {
    let events = recorder.surface().lock().take_events();
    for event in events {
        recorder.handle(&event)?;
    }
    Ok(())
}
