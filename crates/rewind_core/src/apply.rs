//! Applying records to an editing surface.

use crate::error::SurfaceError;
use crate::record::{Complete, Record, Selection};
use crate::surface::EditorSurface;

/// How records are applied to the surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyMode {
    /// Scrolling follows the cursor instead of the recorded offsets.
    pub scroll_to_cursor: bool,
}

/// Apply one record to the surface.
///
/// `external` records and viewport changes have no direct effect on the
/// surface; hosts observe them through the player's interception hook.
pub fn apply_record<S: EditorSurface + ?Sized>(
    surface: &mut S,
    record: &Record,
    mode: ApplyMode,
) -> Result<(), SurfaceError> {
    match record {
        Record::Complete(complete) => {
            apply_checkpoint(surface, complete, mode);
            Ok(())
        }
        Record::Delta(delta) => {
            surface.apply_edit(&delta.edit)?;
            follow_cursor(surface, mode);
            Ok(())
        }
        Record::SelectionChange(change) => {
            surface.set_selection(change.selection());
            follow_cursor(surface, mode);
            Ok(())
        }
        Record::CursorChange(change) => {
            surface.set_cursor(change.location);
            surface.set_selection(Selection::caret(change.location));
            follow_cursor(surface, mode);
            Ok(())
        }
        Record::ScrollChange(change) => {
            // Scroll caused by a cursor move is replaced by following the cursor
            if !(mode.scroll_to_cursor && change.triggered_by_cursor_change) {
                surface.set_scroll(change.position());
            }
            Ok(())
        }
        Record::WindowSizeChange(_) | Record::External(_) => Ok(()),
    }
}

/// Restore the full state captured by a checkpoint.
///
/// Text is only replaced when it differs, so applying the same checkpoint
/// twice leaves the surface unchanged.
pub fn apply_checkpoint<S: EditorSurface + ?Sized>(surface: &mut S, complete: &Complete, mode: ApplyMode) {
    if surface.text() != complete.value {
        surface.set_text(&complete.value);
    }
    surface.set_cursor(complete.cursor);
    surface.set_selection(complete.selection);
    if !mode.scroll_to_cursor {
        surface.set_scroll(complete.scroll);
    }
}

fn follow_cursor<S: EditorSurface + ?Sized>(surface: &mut S, mode: ApplyMode) {
    if mode.scroll_to_cursor {
        surface.scroll_cursor_into_view();
    }
}
