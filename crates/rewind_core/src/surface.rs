//! Editing surface capability interface
//!
//! The concrete editor widget lives outside this crate. Recorders and
//! players see it only through [`EditorSurface`], and learn about changes
//! through [`SurfaceEvent`] notifications forwarded by the host.

use crate::error::SurfaceError;
use crate::record::{EditorLocation, ScrollPosition, Selection, SessionInfo, TextEdit, WindowSize};
use parking_lot::Mutex;
use std::sync::Arc;

/// Kinds of change notification a surface can deliver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceEventKind {
    /// Document text changed
    TextChanged,
    /// Selection or cursor moved
    SelectionChanged,
    /// Scroll offsets changed
    ScrollChanged,
    /// Viewport was resized
    ViewportResized,
    /// Active session switched
    SessionChanged,
}

impl SurfaceEventKind {
    /// All kinds, in installation order.
    pub const ALL: [SurfaceEventKind; 5] = [
        SurfaceEventKind::TextChanged,
        SurfaceEventKind::SelectionChanged,
        SurfaceEventKind::ScrollChanged,
        SurfaceEventKind::ViewportResized,
        SurfaceEventKind::SessionChanged,
    ];

    /// Kinds whose subscription is bound to the session active at install time.
    pub fn is_session_scoped(&self) -> bool {
        matches!(self, SurfaceEventKind::TextChanged | SurfaceEventKind::ScrollChanged)
    }
}

/// A change notification from the surface.
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceEvent {
    /// Text changed through the given raw edit
    TextChanged(TextEdit),
    SelectionChanged,
    ScrollChanged,
    ViewportResized,
    /// The active session is now `name`
    SessionChanged { name: String },
}

impl SurfaceEvent {
    pub fn kind(&self) -> SurfaceEventKind {
        match self {
            SurfaceEvent::TextChanged(_) => SurfaceEventKind::TextChanged,
            SurfaceEvent::SelectionChanged => SurfaceEventKind::SelectionChanged,
            SurfaceEvent::ScrollChanged => SurfaceEventKind::ScrollChanged,
            SurfaceEvent::ViewportResized => SurfaceEventKind::ViewportResized,
            SurfaceEvent::SessionChanged { .. } => SurfaceEventKind::SessionChanged,
        }
    }
}

/// Cursor presentation captured before playback and restored on pause.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CursorStyle {
    pub visible: bool,
    pub blinking: bool,
    pub opacity: f32,
}

impl CursorStyle {
    /// Style forced on while a player is driving the surface.
    pub const PLAYING: CursorStyle = CursorStyle {
        visible: true,
        blinking: true,
        opacity: 1.0,
    };
}

impl Default for CursorStyle {
    fn default() -> Self {
        Self {
            visible: true,
            blinking: true,
            opacity: 1.0,
        }
    }
}

/// Narrow capability interface over an editor widget.
pub trait EditorSurface {
    /// Full text of the active session.
    fn text(&self) -> String;
    /// Replace the full text of the active session.
    fn set_text(&mut self, text: &str);
    /// Apply an incremental edit to the active session.
    fn apply_edit(&mut self, edit: &TextEdit) -> Result<(), SurfaceError>;

    fn cursor(&self) -> EditorLocation;
    fn set_cursor(&mut self, location: EditorLocation);
    fn selection(&self) -> Selection;
    fn set_selection(&mut self, selection: Selection);
    fn scroll(&self) -> ScrollPosition;
    fn set_scroll(&mut self, scroll: ScrollPosition);
    /// Bring the cursor into view, used when scrolling follows the cursor.
    fn scroll_cursor_into_view(&mut self) {}

    /// Visible viewport metrics.
    fn viewport(&self) -> WindowSize;
    /// Whether the surface has input focus.
    fn is_focused(&self) -> bool;

    /// Name of the active session.
    fn active_session(&self) -> String;
    /// Highlighting mode of the active session.
    fn mode(&self) -> String;
    /// Names of every session on the surface.
    fn session_names(&self) -> Vec<String>;
    /// Text of a named session, active or not.
    fn session_contents(&self, name: &str) -> Option<String>;
    /// Highlighting mode of a named session.
    fn session_mode(&self, name: &str) -> Option<String>;
    /// Create (or replace) a named session.
    fn create_session(&mut self, info: &SessionInfo);
    /// Make a named session active.
    fn switch_session(&mut self, name: &str) -> Result<(), SurfaceError>;
    /// Drop a named session.
    fn remove_session(&mut self, name: &str) -> Result<(), SurfaceError>;

    /// Start delivering notifications of `kind`.
    fn subscribe(&mut self, kind: SurfaceEventKind);
    /// Stop delivering notifications of `kind`.
    fn unsubscribe(&mut self, kind: SurfaceEventKind);

    fn cursor_style(&self) -> CursorStyle;
    fn set_cursor_style(&mut self, style: CursorStyle);
}

/// A surface shared between a recorder and a player.
pub type SharedSurface<S> = Arc<Mutex<S>>;

/// Wrap a surface for sharing.
pub fn shared<S: EditorSurface>(surface: S) -> SharedSurface<S> {
    Arc::new(Mutex::new(surface))
}

/// Snapshot of a named session's metadata from the surface.
pub fn session_info<S: EditorSurface + ?Sized>(surface: &S, name: &str) -> Option<SessionInfo> {
    let contents = surface.session_contents(name)?;
    let mode = surface.session_mode(name).unwrap_or_default();
    Some(SessionInfo::new(name, contents, mode))
}

/// Replace the text while keeping the selection where it was.
pub fn replace_text_preserving_selection<S: EditorSurface + ?Sized>(surface: &mut S, text: &str) {
    let selection = surface.selection();
    let cursor = surface.cursor();
    surface.set_text(text);
    surface.set_cursor(cursor);
    surface.set_selection(selection);
}

/// Registry of installed notification handlers.
///
/// Handlers are installed and removed as a set so a component is either
/// fully attached to a surface or not at all.
#[derive(Debug, Default)]
pub struct Subscriptions<H> {
    registrations: Vec<(SurfaceEventKind, H)>,
}

impl<H: Copy> Subscriptions<H> {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    /// Install every `(kind, handler)` pair and subscribe the surface.
    ///
    /// A kind with several handlers is subscribed once.
    pub fn install<S: EditorSurface + ?Sized>(&mut self, surface: &mut S, handlers: &[(SurfaceEventKind, H)]) {
        for &(kind, handler) in handlers {
            if !self.is_registered(kind) {
                surface.subscribe(kind);
            }
            self.registrations.push((kind, handler));
        }
    }

    /// Remove every registration and unsubscribe the surface.
    pub fn remove_all<S: EditorSurface + ?Sized>(&mut self, surface: &mut S) {
        for kind in self.kinds() {
            surface.unsubscribe(kind);
        }
        self.registrations.clear();
    }

    /// Move the session-scoped subscriptions over to the now-active session.
    pub fn rebind_session_scoped<S: EditorSurface + ?Sized>(&mut self, surface: &mut S) {
        for kind in self.kinds().into_iter().filter(SurfaceEventKind::is_session_scoped) {
            surface.unsubscribe(kind);
            surface.subscribe(kind);
        }
    }

    pub fn is_registered(&self, kind: SurfaceEventKind) -> bool {
        self.registrations.iter().any(|(registered, _)| *registered == kind)
    }

    fn kinds(&self) -> Vec<SurfaceEventKind> {
        let mut kinds: Vec<SurfaceEventKind> = Vec::new();
        for (kind, _) in &self.registrations {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        kinds
    }

    /// Handlers registered for `kind`, in installation order.
    pub fn handlers(&self, kind: SurfaceEventKind) -> impl Iterator<Item = H> + '_ {
        self.registrations
            .iter()
            .filter(move |(registered, _)| *registered == kind)
            .map(|(_, handler)| *handler)
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
