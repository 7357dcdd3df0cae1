//! Event model.
//!
//! One [`Record`] describes one observable change to an editing surface.
//! Records are a closed sum type tagged on `type` in the wire form:
//!
//! - `complete` - full-state checkpoint
//! - `delta` - incremental text edit
//! - `selectionchange` / `cursorchange` - caret movement
//! - `scrollchange` / `windowsizechange` - viewport movement
//! - `external` - caller-supplied payload

use crate::time::{wire, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A position in document text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EditorLocation {
    pub row: usize,
    pub column: usize,
}

impl EditorLocation {
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for EditorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

/// A selection range. Empty when `start == end`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub start: EditorLocation,
    pub end: EditorLocation,
}

impl Selection {
    pub const fn new(start: EditorLocation, end: EditorLocation) -> Self {
        Self { start, end }
    }

    /// A collapsed selection at `location`.
    pub const fn caret(location: EditorLocation) -> Self {
        Self {
            start: location,
            end: location,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Scroll offsets in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub top: f64,
    pub left: f64,
}

impl ScrollPosition {
    pub const fn new(top: f64, left: f64) -> Self {
        Self { top, left }
    }
}

/// Visible viewport metrics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSize {
    pub width: f64,
    pub height: f64,
    pub rows: u32,
    pub font_size: f64,
    pub line_height: f64,
}

/// Why a checkpoint was taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointReason {
    /// Recording started
    Start,
    /// Periodic checkpoint timer fired
    Timer,
    /// Requested by the caller
    Manual,
    /// Active session changed or a session was registered
    Session,
    /// Recording stopped
    End,
    /// Event-count threshold reached
    Counter,
}

/// Metadata for one independently tracked document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub name: String,
    pub contents: String,
    pub mode: String,
}

impl SessionInfo {
    pub fn new(name: impl Into<String>, contents: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
            mode: mode.into(),
        }
    }
}

/// Full-state checkpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complete {
    #[serde(with = "wire")]
    pub timestamp: Timestamp,
    pub focused: bool,
    pub value: String,
    pub selection: Selection,
    pub cursor: EditorLocation,
    pub scroll: ScrollPosition,
    pub window: WindowSize,
    pub reason: CheckpointReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    /// Contents of every registered session when the checkpoint was taken.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub session_info: Vec<SessionInfo>,
}

/// Edit direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditAction {
    Insert,
    Remove,
}

/// A raw edit operation, as reported by the surface and replayed onto it.
///
/// `lines` holds the inserted or removed text split on newlines, so a
/// single newline is `["", ""]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub start: EditorLocation,
    pub end: EditorLocation,
    pub action: EditAction,
    pub lines: Vec<String>,
}

impl TextEdit {
    /// Insert `text` at `at`, computing the end location.
    pub fn insert(at: EditorLocation, text: &str) -> Self {
        let lines: Vec<String> = text.split('\n').map(str::to_owned).collect();
        let end = end_of(at, &lines);
        Self {
            start: at,
            end,
            action: EditAction::Insert,
            lines,
        }
    }

    /// Remove `text`, which starts at `at`.
    pub fn remove(at: EditorLocation, text: &str) -> Self {
        let lines: Vec<String> = text.split('\n').map(str::to_owned).collect();
        let end = end_of(at, &lines);
        Self {
            start: at,
            end,
            action: EditAction::Remove,
            lines,
        }
    }

    /// The edited text joined back together.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

fn end_of(start: EditorLocation, lines: &[String]) -> EditorLocation {
    match lines {
        [] => start,
        [only] => EditorLocation::new(start.row, start.column + only.chars().count()),
        [.., last] => EditorLocation::new(start.row + lines.len() - 1, last.chars().count()),
    }
}

/// Incremental text edit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(with = "wire")]
    pub timestamp: Timestamp,
    pub focused: bool,
    #[serde(flatten)]
    pub edit: TextEdit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

/// New non-empty selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectionChange {
    #[serde(with = "wire")]
    pub timestamp: Timestamp,
    pub focused: bool,
    pub start: EditorLocation,
    pub end: EditorLocation,
}

impl SelectionChange {
    pub fn selection(&self) -> Selection {
        Selection::new(self.start, self.end)
    }
}

/// New cursor location while the selection is empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CursorChange {
    #[serde(with = "wire")]
    pub timestamp: Timestamp,
    pub focused: bool,
    pub location: EditorLocation,
}

/// New scroll offsets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollChange {
    #[serde(with = "wire")]
    pub timestamp: Timestamp,
    pub focused: bool,
    pub top: f64,
    pub left: f64,
    /// Set when the scroll was a side effect of moving the cursor.
    #[serde(default)]
    pub triggered_by_cursor_change: bool,
}

impl ScrollChange {
    pub fn position(&self) -> ScrollPosition {
        ScrollPosition::new(self.top, self.left)
    }
}

/// Viewport metrics changed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowSizeChange {
    #[serde(with = "wire")]
    pub timestamp: Timestamp,
    pub focused: bool,
    #[serde(flatten)]
    pub window: WindowSize,
}

/// Caller-supplied event outside editor introspection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalChange {
    #[serde(with = "wire")]
    pub timestamp: Timestamp,
    #[serde(default)]
    pub focused: bool,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// One recorded change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Record {
    #[serde(rename = "complete")]
    Complete(Complete),
    #[serde(rename = "delta")]
    Delta(Delta),
    #[serde(rename = "selectionchange")]
    SelectionChange(SelectionChange),
    #[serde(rename = "cursorchange")]
    CursorChange(CursorChange),
    #[serde(rename = "scrollchange")]
    ScrollChange(ScrollChange),
    #[serde(rename = "windowsizechange")]
    WindowSizeChange(WindowSizeChange),
    #[serde(rename = "external")]
    External(ExternalChange),
}

/// Record discriminant, used for summaries and filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Complete,
    Delta,
    SelectionChange,
    CursorChange,
    ScrollChange,
    WindowSizeChange,
    External,
}

impl RecordKind {
    /// The wire `type` tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Complete => "complete",
            RecordKind::Delta => "delta",
            RecordKind::SelectionChange => "selectionchange",
            RecordKind::CursorChange => "cursorchange",
            RecordKind::ScrollChange => "scrollchange",
            RecordKind::WindowSizeChange => "windowsizechange",
            RecordKind::External => "external",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Record {
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Record::Complete(r) => r.timestamp,
            Record::Delta(r) => r.timestamp,
            Record::SelectionChange(r) => r.timestamp,
            Record::CursorChange(r) => r.timestamp,
            Record::ScrollChange(r) => r.timestamp,
            Record::WindowSizeChange(r) => r.timestamp,
            Record::External(r) => r.timestamp,
        }
    }

    /// Overwrite the timestamp. Used by the recorder to keep a trace monotonic.
    pub fn set_timestamp(&mut self, timestamp: Timestamp) {
        match self {
            Record::Complete(r) => r.timestamp = timestamp,
            Record::Delta(r) => r.timestamp = timestamp,
            Record::SelectionChange(r) => r.timestamp = timestamp,
            Record::CursorChange(r) => r.timestamp = timestamp,
            Record::ScrollChange(r) => r.timestamp = timestamp,
            Record::WindowSizeChange(r) => r.timestamp = timestamp,
            Record::External(r) => r.timestamp = timestamp,
        }
    }

    pub fn focused(&self) -> bool {
        match self {
            Record::Complete(r) => r.focused,
            Record::Delta(r) => r.focused,
            Record::SelectionChange(r) => r.focused,
            Record::CursorChange(r) => r.focused,
            Record::ScrollChange(r) => r.focused,
            Record::WindowSizeChange(r) => r.focused,
            Record::External(r) => r.focused,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Complete(_) => RecordKind::Complete,
            Record::Delta(_) => RecordKind::Delta,
            Record::SelectionChange(_) => RecordKind::SelectionChange,
            Record::CursorChange(_) => RecordKind::CursorChange,
            Record::ScrollChange(_) => RecordKind::ScrollChange,
            Record::WindowSizeChange(_) => RecordKind::WindowSizeChange,
            Record::External(_) => RecordKind::External,
        }
    }

    /// True for `complete` records.
    pub fn is_checkpoint(&self) -> bool {
        matches!(self, Record::Complete(_))
    }

    pub fn as_complete(&self) -> Option<&Complete> {
        match self {
            Record::Complete(complete) => Some(complete),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::from_epoch_millis;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_text_edit_end_location() {
        let edit = TextEdit::insert(EditorLocation::new(2, 3), "ab\ncde");
        assert_eq!(edit.end, EditorLocation::new(3, 3));
        assert_eq!(edit.lines, vec!["ab".to_string(), "cde".to_string()]);

        let edit = TextEdit::insert(EditorLocation::new(0, 5), " world");
        assert_eq!(edit.end, EditorLocation::new(0, 11));
    }

    #[test]
    fn test_delta_wire_shape() {
        let record = Record::Delta(Delta {
            timestamp: from_epoch_millis(1_000),
            focused: true,
            edit: TextEdit::insert(EditorLocation::new(0, 0), "x"),
            id: Some(3),
        });
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "delta",
                "timestamp": "1970-01-01T00:00:01.000Z",
                "focused": true,
                "start": {"row": 0, "column": 0},
                "end": {"row": 0, "column": 1},
                "action": "insert",
                "lines": ["x"],
                "id": 3,
            })
        );
    }

    #[test]
    fn test_timestamp_accepts_epoch_millis() {
        let record: Record = serde_json::from_value(json!({
            "type": "cursorchange",
            "timestamp": 2_500,
            "focused": false,
            "location": {"row": 1, "column": 4},
        }))
        .unwrap();
        assert_eq!(record.timestamp(), from_epoch_millis(2_500));
        assert_eq!(record.kind(), RecordKind::CursorChange);
    }

    #[test]
    fn test_external_payload_flattened() {
        let record: Record = serde_json::from_value(json!({
            "type": "external",
            "timestamp": "2024-01-01T00:00:00.000Z",
            "output": "hello",
        }))
        .unwrap();
        match &record {
            Record::External(external) => {
                assert_eq!(external.payload.get("output"), Some(&json!("hello")));
                assert!(!external.payload.contains_key("type"));
                assert!(!external.payload.contains_key("timestamp"));
            }
            other => panic!("unexpected record {other:?}"),
        }
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], json!("external"));
        assert_eq!(value["output"], json!("hello"));
    }

    #[test]
    fn test_complete_omits_empty_session_fields() {
        let record = Record::Complete(Complete {
            timestamp: from_epoch_millis(0),
            focused: false,
            value: "hello".into(),
            selection: Selection::default(),
            cursor: EditorLocation::default(),
            scroll: ScrollPosition::default(),
            window: WindowSize::default(),
            reason: CheckpointReason::Counter,
            session_name: None,
            session_info: Vec::new(),
        });
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["reason"], json!("counter"));
        assert!(value.get("sessionName").is_none());
        assert!(value.get("sessionInfo").is_none());
        assert_eq!(value["window"]["fontSize"], json!(0.0));
    }
}
