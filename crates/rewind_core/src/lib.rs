//! Rewind Core
//!
//! Data model and editor abstraction for recording and replaying editing
//! sessions:
//!
//! - **Records**: one tagged record per observable change to an editor
//! - **Traces**: immutable, validated record sequences with a JSON wire form
//! - **Surfaces**: the capability trait an editor widget implements
//! - **Clocks**: injectable wall-clock sources for deterministic tests
//!
//! # Example
//!
//! ```rust
//! use rewind_core::{CursorChange, EditorLocation, Record, Trace};
//! use rewind_core::time::from_epoch_millis;
//!
//! let records = vec![
//!     Record::CursorChange(CursorChange {
//!         timestamp: from_epoch_millis(0),
//!         focused: true,
//!         location: EditorLocation::new(0, 0),
//!     }),
//!     Record::CursorChange(CursorChange {
//!         timestamp: from_epoch_millis(1_500),
//!         focused: true,
//!         location: EditorLocation::new(0, 4),
//!     }),
//! ];
//!
//! let trace = Trace::from_records(records).unwrap();
//! assert_eq!(trace.duration_ms(), 1_500);
//!
//! let decoded = Trace::from_json(&trace.to_json().unwrap()).unwrap();
//! assert_eq!(decoded, trace);
//! ```

pub mod apply;
pub mod config;
pub mod error;
pub mod record;
pub mod surface;
pub mod time;
pub mod trace;

pub use apply::{apply_checkpoint, apply_record, ApplyMode};
pub use config::{PlayerConfig, RecorderOptions, RewindConfig, StreamerConfig, SyncConfig};
pub use error::{Result, SurfaceError, TraceError};
pub use record::{
    CheckpointReason, Complete, CursorChange, Delta, EditAction, EditorLocation, ExternalChange, Record, RecordKind,
    ScrollChange, ScrollPosition, Selection, SelectionChange, SessionInfo, TextEdit, WindowSize, WindowSizeChange,
};
pub use surface::{CursorStyle, EditorSurface, SharedSurface, SurfaceEvent, SurfaceEventKind};
pub use time::{Clock, ManualClock, SharedClock, SystemClock, Timestamp};
pub use trace::{Trace, TraceContent, TraceSummary};
