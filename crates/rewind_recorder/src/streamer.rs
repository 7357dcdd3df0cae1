//! Converts raw surface notifications into records.
//!
//! The streamer owns no surface. The host forwards each [`SurfaceEvent`] to
//! [`Streamer::handle`] and calls [`Streamer::tick`] when
//! [`Streamer::next_deadline`] passes; both return the records produced.

use crate::error::{Error, Result};
use crate::throttle::Throttle;
use rewind_core::surface::Subscriptions;
use rewind_core::{
    CheckpointReason, Complete, CursorChange, Delta, EditorLocation, EditorSurface, Record, ScrollChange,
    ScrollPosition, Selection, SelectionChange, SharedClock, StreamerConfig, SurfaceEvent, SurfaceEventKind,
    TextEdit, Timestamp, WindowSize, WindowSizeChange,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Handler {
    Text,
    Selection,
    Scroll,
    WindowSize,
    Session,
}

/// Viewport metrics are re-checked on scroll as well as on resize.
const HANDLERS: [(SurfaceEventKind, Handler); 6] = [
    (SurfaceEventKind::TextChanged, Handler::Text),
    (SurfaceEventKind::SelectionChanged, Handler::Selection),
    (SurfaceEventKind::ScrollChanged, Handler::Scroll),
    (SurfaceEventKind::ScrollChanged, Handler::WindowSize),
    (SurfaceEventKind::ViewportResized, Handler::WindowSize),
    (SurfaceEventKind::SessionChanged, Handler::Session),
];

/// Subscription manager that normalizes surface changes into records.
pub struct Streamer {
    clock: SharedClock,
    config: StreamerConfig,
    running: bool,
    session_name: Option<String>,
    subscriptions: Subscriptions<Handler>,
    last_value: String,
    last_selection: Selection,
    last_cursor: EditorLocation,
    last_scroll: ScrollPosition,
    last_window: WindowSize,
    selection_throttle: Throttle,
    scroll_throttle: Throttle,
    window_throttle: Throttle,
    /// The most recent notification was a selection change
    cursor_moved: bool,
    /// The pending scroll evaluation follows a cursor move
    scroll_after_cursor: bool,
    next_delta_id: u64,
}

impl Streamer {
    pub fn new(clock: SharedClock, config: StreamerConfig) -> Self {
        let throttle_ms = config.throttle_ms;
        Self {
            clock,
            config,
            running: false,
            session_name: None,
            subscriptions: Subscriptions::new(),
            last_value: String::new(),
            last_selection: Selection::default(),
            last_cursor: EditorLocation::default(),
            last_scroll: ScrollPosition::default(),
            last_window: WindowSize::default(),
            selection_throttle: Throttle::new(throttle_ms),
            scroll_throttle: Throttle::new(throttle_ms),
            window_throttle: Throttle::new(throttle_ms),
            cursor_moved: false,
            scroll_after_cursor: false,
            next_delta_id: 0,
        }
    }

    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Label carried by checkpoints. Required for session switches while running.
    pub fn session_name(&self) -> Option<&str> {
        self.session_name.as_deref()
    }

    pub fn set_session_name(&mut self, name: Option<String>) {
        self.session_name = name;
    }

    /// Attach to the surface and emit the starting checkpoint.
    pub fn start<S: EditorSurface + ?Sized>(&mut self, surface: &mut S) -> Result<Record> {
        if self.running {
            return Err(Error::InvalidState {
                expected: "stopped",
                found: "running",
            });
        }

        self.last_value = surface.text();
        self.last_selection = surface.selection();
        self.last_cursor = surface.cursor();
        self.last_scroll = surface.scroll();
        self.last_window = surface.viewport();
        self.cursor_moved = false;
        self.scroll_after_cursor = false;
        self.next_delta_id = 0;

        let throttle_ms = self.config.throttle_ms;
        self.selection_throttle = Throttle::new(throttle_ms);
        self.scroll_throttle = Throttle::new(throttle_ms);
        self.window_throttle = Throttle::new(throttle_ms);

        self.subscriptions.install(surface, &HANDLERS);
        self.running = true;
        tracing::debug!(session = ?self.session_name, "streamer started");

        Ok(Record::Complete(self.checkpoint(surface, CheckpointReason::Start)))
    }

    /// Detach from the surface and emit the final checkpoint.
    ///
    /// Pending throttled evaluations are discarded.
    pub fn stop<S: EditorSurface + ?Sized>(&mut self, surface: &mut S) -> Result<Record> {
        if !self.running {
            return Err(Error::NotRunning);
        }
        self.subscriptions.remove_all(surface);
        self.selection_throttle.cancel();
        self.scroll_throttle.cancel();
        self.window_throttle.cancel();
        self.running = false;
        tracing::debug!("streamer stopped");

        Ok(Record::Complete(self.checkpoint(surface, CheckpointReason::End)))
    }

    /// Full-state snapshot of the surface with the current session label.
    pub fn checkpoint<S: EditorSurface + ?Sized>(&self, surface: &S, reason: CheckpointReason) -> Complete {
        snapshot(surface, self.clock.now(), reason, self.session_name.as_deref())
    }

    /// Process one surface notification.
    pub fn handle<S: EditorSurface + ?Sized>(&mut self, surface: &mut S, event: &SurfaceEvent) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        if !self.running {
            return Ok(records);
        }

        let now = self.clock.now();
        let handlers: Vec<Handler> = self.subscriptions.handlers(event.kind()).collect();
        for handler in handlers {
            match (handler, event) {
                (Handler::Text, SurfaceEvent::TextChanged(edit)) => {
                    self.cursor_moved = false;
                    records.extend(self.on_text(surface, edit, now));
                }
                (Handler::Selection, _) => {
                    self.cursor_moved = true;
                    if self.selection_throttle.signal(now) {
                        records.extend(self.evaluate_selection(surface, now));
                    }
                }
                (Handler::Scroll, _) => {
                    self.scroll_after_cursor |= self.cursor_moved;
                    self.cursor_moved = false;
                    if self.scroll_throttle.signal(now) {
                        records.extend(self.evaluate_scroll(surface, now));
                    }
                }
                (Handler::WindowSize, _) => {
                    self.cursor_moved = false;
                    if self.window_throttle.signal(now) {
                        records.extend(self.evaluate_window(surface, now));
                    }
                }
                (Handler::Session, SurfaceEvent::SessionChanged { name }) => {
                    self.cursor_moved = false;
                    records.push(self.on_session_change(surface, name)?);
                }
                _ => {}
            }
        }
        Ok(records)
    }

    /// Run trailing evaluations that are due.
    pub fn tick<S: EditorSurface + ?Sized>(&mut self, surface: &mut S) -> Vec<Record> {
        let mut records = Vec::new();
        if !self.running {
            return records;
        }
        let now = self.clock.now();
        if self.selection_throttle.poll(now) {
            records.extend(self.evaluate_selection(surface, now));
        }
        if self.scroll_throttle.poll(now) {
            records.extend(self.evaluate_scroll(surface, now));
        }
        if self.window_throttle.poll(now) {
            records.extend(self.evaluate_window(surface, now));
        }
        records
    }

    /// Earliest pending trailing evaluation.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        if !self.running {
            return None;
        }
        [
            self.selection_throttle.deadline(),
            self.scroll_throttle.deadline(),
            self.window_throttle.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn on_text<S: EditorSurface + ?Sized>(&mut self, surface: &S, edit: &TextEdit, now: Timestamp) -> Option<Record> {
        let value = surface.text();
        if value == self.last_value {
            return None;
        }
        self.last_value = value;

        let id = self.next_delta_id;
        self.next_delta_id += 1;
        Some(Record::Delta(Delta {
            timestamp: now,
            focused: surface.is_focused(),
            edit: edit.clone(),
            id: Some(id),
        }))
    }

    /// Selection and cursor changes are mutually exclusive per evaluation.
    fn evaluate_selection<S: EditorSurface + ?Sized>(&mut self, surface: &S, now: Timestamp) -> Option<Record> {
        let selection = surface.selection();
        let cursor = surface.cursor();
        let selection_changed = selection != self.last_selection;
        let cursor_changed = cursor != self.last_cursor;
        self.last_selection = selection;
        self.last_cursor = cursor;

        if selection.is_empty() {
            cursor_changed.then(|| {
                Record::CursorChange(CursorChange {
                    timestamp: now,
                    focused: surface.is_focused(),
                    location: cursor,
                })
            })
        } else {
            selection_changed.then(|| {
                Record::SelectionChange(SelectionChange {
                    timestamp: now,
                    focused: surface.is_focused(),
                    start: selection.start,
                    end: selection.end,
                })
            })
        }
    }

    fn evaluate_scroll<S: EditorSurface + ?Sized>(&mut self, surface: &S, now: Timestamp) -> Option<Record> {
        let triggered_by_cursor_change = std::mem::take(&mut self.scroll_after_cursor);
        let viewport = surface.viewport();
        let raw = surface.scroll();
        let scroll = ScrollPosition::new(clamp(raw.top, viewport.height), clamp(raw.left, viewport.width));
        if scroll == self.last_scroll {
            return None;
        }
        self.last_scroll = scroll;

        Some(Record::ScrollChange(ScrollChange {
            timestamp: now,
            focused: surface.is_focused(),
            top: scroll.top,
            left: scroll.left,
            triggered_by_cursor_change,
        }))
    }

    fn evaluate_window<S: EditorSurface + ?Sized>(&mut self, surface: &S, now: Timestamp) -> Option<Record> {
        let window = surface.viewport();
        if window == self.last_window {
            return None;
        }
        self.last_window = window;

        Some(Record::WindowSizeChange(WindowSizeChange {
            timestamp: now,
            focused: surface.is_focused(),
            window,
        }))
    }

    fn on_session_change<S: EditorSurface + ?Sized>(&mut self, surface: &mut S, name: &str) -> Result<Record> {
        if self.session_name.is_none() {
            return Err(Error::SessionLabelRequired);
        }
        self.session_name = Some(name.to_string());
        let record = Record::Complete(self.checkpoint(surface, CheckpointReason::Session));

        self.subscriptions.rebind_session_scoped(surface);
        self.last_value = surface.text();
        self.last_scroll = surface.scroll();
        tracing::debug!(session = name, "streamer rebound to session");

        Ok(record)
    }
}

/// Capture the full state of a surface.
pub fn snapshot<S: EditorSurface + ?Sized>(
    surface: &S,
    timestamp: Timestamp,
    reason: CheckpointReason,
    session_name: Option<&str>,
) -> Complete {
    Complete {
        timestamp,
        focused: surface.is_focused(),
        value: surface.text(),
        selection: surface.selection(),
        cursor: surface.cursor(),
        scroll: surface.scroll(),
        window: surface.viewport(),
        reason,
        session_name: session_name.filter(|name| !name.is_empty()).map(str::to_owned),
        session_info: Vec::new(),
    }
}

fn clamp(value: f64, max: f64) -> f64 {
    value.min(max).max(0.0)
}
