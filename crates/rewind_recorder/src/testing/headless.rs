//! In-memory editor surface for testing.
//!
//! Provides a way to record and replay without an editor widget, useful for:
//! - Unit testing recorders and players
//! - Headless trace verification
//! - CI pipelines

use indexmap::IndexMap;
use rewind_core::{
    CursorStyle, EditAction, EditorLocation, EditorSurface, ScrollPosition, Selection, SessionInfo,
    SurfaceError, SurfaceEvent, SurfaceEventKind, TextEdit, WindowSize,
};
use std::collections::HashMap;

/// Name of the session a new editor starts with.
pub const DEFAULT_SESSION: &str = "main";

/// Mode of sessions created without one.
pub const DEFAULT_MODE: &str = "text";

/// Viewport of a new editor.
pub const DEFAULT_VIEWPORT: WindowSize = WindowSize {
    width: 800.0,
    height: 600.0,
    rows: 30,
    font_size: 14.0,
    line_height: 20.0,
};

/// One document held by the editor.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub text: String,
    pub mode: String,
    pub cursor: EditorLocation,
    pub selection: Selection,
    pub scroll: ScrollPosition,
}

impl Document {
    fn new(text: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: mode.into(),
            cursor: EditorLocation::default(),
            selection: Selection::default(),
            scroll: ScrollPosition::default(),
        }
    }
}

/// A headless editing surface.
///
/// Programmatic setters from [`EditorSurface`] change state silently, the
/// way a widget's API does. The user-simulation methods ([`insert`],
/// [`move_cursor`], [`select`], [`scroll_to`], [`resize`]) queue the
/// notifications a real widget would deliver, and [`take_events`] drains
/// them for forwarding to a recorder.
///
/// [`insert`]: HeadlessEditor::insert
/// [`move_cursor`]: HeadlessEditor::move_cursor
/// [`select`]: HeadlessEditor::select
/// [`scroll_to`]: HeadlessEditor::scroll_to
/// [`resize`]: HeadlessEditor::resize
/// [`take_events`]: HeadlessEditor::take_events
pub struct HeadlessEditor {
    documents: IndexMap<String, Document>,
    active: String,
    viewport: WindowSize,
    focused: bool,
    cursor_style: CursorStyle,
    /// Subscribed kinds; session-scoped kinds remember their session.
    subscriptions: HashMap<SurfaceEventKind, Option<String>>,
    outbox: Vec<SurfaceEvent>,
    scroll_into_view_count: usize,
}

impl HeadlessEditor {
    /// Create an editor holding `text` in the default session.
    pub fn new(text: &str) -> Self {
        let mut documents = IndexMap::new();
        documents.insert(DEFAULT_SESSION.to_string(), Document::new(text, DEFAULT_MODE));
        Self {
            documents,
            active: DEFAULT_SESSION.to_string(),
            viewport: DEFAULT_VIEWPORT,
            focused: true,
            cursor_style: CursorStyle::default(),
            subscriptions: HashMap::new(),
            outbox: Vec::new(),
            scroll_into_view_count: 0,
        }
    }

    /// Drain queued notifications.
    pub fn take_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Whether notifications of `kind` reach the current session.
    pub fn is_subscribed(&self, kind: SurfaceEventKind) -> bool {
        match self.subscriptions.get(&kind) {
            Some(Some(session)) => *session == self.active,
            Some(None) => true,
            None => false,
        }
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    /// How often playback asked to bring the cursor into view.
    pub fn scroll_into_view_count(&self) -> usize {
        self.scroll_into_view_count
    }

    pub fn document(&self, name: &str) -> Option<&Document> {
        self.documents.get(name)
    }

    /// Type `text` at `at` and move the cursor after it.
    pub fn insert(&mut self, at: EditorLocation, text: &str) {
        self.user_edit(TextEdit::insert(at, text));
    }

    /// Delete `text`, which starts at `at`.
    pub fn delete(&mut self, at: EditorLocation, text: &str) {
        self.user_edit(TextEdit::remove(at, text));
    }

    pub fn move_cursor(&mut self, location: EditorLocation) {
        self.set_cursor(location);
        self.notify(SurfaceEvent::SelectionChanged);
    }

    pub fn select(&mut self, selection: Selection) {
        let document = self.active_document_mut();
        document.selection = selection;
        document.cursor = selection.end;
        self.notify(SurfaceEvent::SelectionChanged);
    }

    /// Scroll to a raw position. The editor does not clamp.
    pub fn scroll_to(&mut self, scroll: ScrollPosition) {
        self.set_scroll(scroll);
        self.notify(SurfaceEvent::ScrollChanged);
    }

    pub fn resize(&mut self, viewport: WindowSize) {
        self.viewport = viewport;
        self.notify(SurfaceEvent::ViewportResized);
    }

    fn user_edit(&mut self, edit: TextEdit) {
        if let Err(err) = self.apply_edit(&edit) {
            tracing::warn!(%err, "headless edit rejected");
            return;
        }
        let cursor = match edit.action {
            EditAction::Insert => edit.end,
            EditAction::Remove => edit.start,
        };
        self.notify(SurfaceEvent::TextChanged(edit));
        self.set_cursor(cursor);
        self.notify(SurfaceEvent::SelectionChanged);
    }

    fn notify(&mut self, event: SurfaceEvent) {
        if self.is_subscribed(event.kind()) {
            self.outbox.push(event);
        }
    }

    fn active_document(&self) -> &Document {
        // The active session always exists
        &self.documents[&self.active]
    }

    fn active_document_mut(&mut self) -> &mut Document {
        let active = self.active.clone();
        self.documents.entry(active).or_insert_with(|| Document::new("", DEFAULT_MODE))
    }

    /// Byte offset of a location in `text`.
    fn offset(text: &str, location: EditorLocation) -> Result<usize, SurfaceError> {
        let out_of_bounds = SurfaceError::OutOfBounds {
            row: location.row,
            column: location.column,
        };
        let mut line_start = 0;
        for (row, line) in text.split('\n').enumerate() {
            if row == location.row {
                if location.column == line.chars().count() {
                    return Ok(line_start + line.len());
                }
                return line
                    .char_indices()
                    .nth(location.column)
                    .map(|(index, _)| line_start + index)
                    .ok_or(out_of_bounds);
            }
            line_start += line.len() + 1;
        }
        Err(out_of_bounds)
    }
}

impl Default for HeadlessEditor {
    fn default() -> Self {
        Self::new("")
    }
}

impl EditorSurface for HeadlessEditor {
    fn text(&self) -> String {
        self.active_document().text.clone()
    }

    fn set_text(&mut self, text: &str) {
        self.active_document_mut().text = text.to_string();
    }

    fn apply_edit(&mut self, edit: &TextEdit) -> Result<(), SurfaceError> {
        let document = self.active_document_mut();
        let start = Self::offset(&document.text, edit.start)?;
        let text = edit.text();
        match edit.action {
            EditAction::Insert => document.text.insert_str(start, &text),
            EditAction::Remove => {
                let end = start + text.len();
                match document.text.get(start..end) {
                    Some(existing) if existing == text => document.text.replace_range(start..end, ""),
                    Some(existing) => {
                        return Err(SurfaceError::Mismatch(format!("expected {text:?}, found {existing:?}")))
                    }
                    None => {
                        return Err(SurfaceError::OutOfBounds {
                            row: edit.end.row,
                            column: edit.end.column,
                        })
                    }
                }
            }
        }
        Ok(())
    }

    fn cursor(&self) -> EditorLocation {
        self.active_document().cursor
    }

    /// Moving the cursor collapses the selection onto it.
    fn set_cursor(&mut self, location: EditorLocation) {
        let document = self.active_document_mut();
        document.cursor = location;
        document.selection = Selection::caret(location);
    }

    fn selection(&self) -> Selection {
        self.active_document().selection
    }

    fn set_selection(&mut self, selection: Selection) {
        let document = self.active_document_mut();
        if document.cursor != selection.start && document.cursor != selection.end {
            document.cursor = selection.end;
        }
        document.selection = selection;
    }

    fn scroll(&self) -> ScrollPosition {
        self.active_document().scroll
    }

    fn set_scroll(&mut self, scroll: ScrollPosition) {
        self.active_document_mut().scroll = scroll;
    }

    fn scroll_cursor_into_view(&mut self) {
        self.scroll_into_view_count += 1;
        let line_height = self.viewport.line_height;
        let height = self.viewport.height;
        let document = self.active_document_mut();
        let top = document.cursor.row as f64 * line_height;
        if top < document.scroll.top || top + line_height > document.scroll.top + height {
            document.scroll.top = top;
        }
    }

    fn viewport(&self) -> WindowSize {
        self.viewport
    }

    fn is_focused(&self) -> bool {
        self.focused
    }

    fn active_session(&self) -> String {
        self.active.clone()
    }

    fn mode(&self) -> String {
        self.active_document().mode.clone()
    }

    fn session_names(&self) -> Vec<String> {
        self.documents.keys().cloned().collect()
    }

    fn session_contents(&self, name: &str) -> Option<String> {
        self.documents.get(name).map(|document| document.text.clone())
    }

    fn session_mode(&self, name: &str) -> Option<String> {
        self.documents.get(name).map(|document| document.mode.clone())
    }

    fn create_session(&mut self, info: &SessionInfo) {
        self.documents
            .insert(info.name.clone(), Document::new(info.contents.clone(), info.mode.clone()));
    }

    fn switch_session(&mut self, name: &str) -> Result<(), SurfaceError> {
        if !self.documents.contains_key(name) {
            return Err(SurfaceError::UnknownSession(name.to_string()));
        }
        if self.active != name {
            self.active = name.to_string();
            self.notify(SurfaceEvent::SessionChanged { name: name.to_string() });
        }
        Ok(())
    }

    fn remove_session(&mut self, name: &str) -> Result<(), SurfaceError> {
        if self.documents.shift_remove(name).is_none() {
            return Err(SurfaceError::UnknownSession(name.to_string()));
        }
        if self.active == name {
            self.active = match self.documents.keys().next() {
                Some(first) => first.clone(),
                None => {
                    self.documents
                        .insert(DEFAULT_SESSION.to_string(), Document::new("", DEFAULT_MODE));
                    DEFAULT_SESSION.to_string()
                }
            };
        }
        Ok(())
    }

    fn subscribe(&mut self, kind: SurfaceEventKind) {
        let session = kind.is_session_scoped().then(|| self.active.clone());
        self.subscriptions.insert(kind, session);
    }

    fn unsubscribe(&mut self, kind: SurfaceEventKind) {
        self.subscriptions.remove(&kind);
    }

    fn cursor_style(&self) -> CursorStyle {
        self.cursor_style
    }

    fn set_cursor_style(&mut self, style: CursorStyle) {
        self.cursor_style = style;
    }
}
