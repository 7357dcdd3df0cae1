//! Named editors recorded and replayed in lockstep.

use super::{EditorRecordReplayer, EditorTrack, ReplayerState};
use crate::error::{Error, Result};
use crate::replay::valid_rate;
use indexmap::IndexMap;
use rewind_core::{EditorSurface, SurfaceEvent, Timestamp, Trace};
use std::sync::Arc;

/// Several named editors recorded and replayed together.
///
/// Every operation is broadcast to all editors. Position and rate are read
/// from the first editor, which all others follow.
pub struct MultiEditorRecordReplayer<S: EditorSurface> {
    editors: IndexMap<String, EditorRecordReplayer<S>>,
    state: ReplayerState,
}

impl<S: EditorSurface> MultiEditorRecordReplayer<S> {
    pub fn new() -> Self {
        Self {
            editors: IndexMap::new(),
            state: ReplayerState::Paused,
        }
    }

    /// Add or replace an editor. Only while paused.
    pub fn add_editor(&mut self, name: impl Into<String>, editor: EditorRecordReplayer<S>) -> Result<()> {
        self.expect(ReplayerState::Paused)?;
        let name = name.into();
        tracing::debug!(editor = %name, "editor added");
        self.editors.insert(name, editor);
        Ok(())
    }

    pub fn editor(&self, name: &str) -> Option<&EditorRecordReplayer<S>> {
        self.editors.get(name)
    }

    pub fn editor_mut(&mut self, name: &str) -> Result<&mut EditorRecordReplayer<S>> {
        self.editors
            .get_mut(name)
            .ok_or_else(|| Error::UnknownEditor(name.to_string()))
    }

    pub fn editor_names(&self) -> Vec<String> {
        self.editors.keys().cloned().collect()
    }

    /// Forward a notification from one editor's surface.
    pub fn handle(&mut self, name: &str, event: &SurfaceEvent) -> Result<()> {
        self.editor_mut(name)?.handle(event)
    }

    pub fn percent(&self) -> f64 {
        let duration = self.duration();
        if duration <= 0.0 {
            return 0.0;
        }
        self.current_time() / duration * 100.0
    }

    pub fn set_percent(&mut self, percent: f64) -> Result<()> {
        self.set_current_time(self.duration() * percent / 100.0)
    }

    fn first(&self) -> Option<&EditorRecordReplayer<S>> {
        self.editors.values().next()
    }

    fn expect(&self, expected: ReplayerState) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                expected: expected.as_str(),
                found: self.state.as_str(),
            });
        }
        Ok(())
    }

    fn follow_editors(&mut self) {
        if self.state == ReplayerState::Playing
            && self.editors.values().all(|editor| editor.state() != ReplayerState::Playing)
        {
            self.state = ReplayerState::Paused;
        }
    }
}

impl<S: EditorSurface> Default for MultiEditorRecordReplayer<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EditorSurface> EditorTrack for MultiEditorRecordReplayer<S> {
    type Source = IndexMap<String, Arc<Trace>>;

    fn state(&self) -> ReplayerState {
        self.state
    }

    /// Start every editor. A failure stops the editors already started.
    fn record(&mut self) -> Result<()> {
        self.expect(ReplayerState::Paused)?;
        let names = self.editor_names();
        for (started, name) in names.iter().enumerate() {
            let result = self.editor_mut(name).and_then(|editor| editor.record());
            if let Err(err) = result {
                for name in &names[..started] {
                    if let Some(editor) = self.editors.get_mut(name) {
                        if let Err(stop_err) = editor.stop() {
                            tracing::warn!(editor = %name, err = %stop_err, "rollback stop failed");
                        }
                    }
                }
                return Err(err);
            }
        }
        self.state = ReplayerState::Recording;
        Ok(())
    }

    /// Stop every editor, even after one fails.
    fn stop(&mut self) -> Result<Self::Source> {
        if self.state != ReplayerState::Recording {
            return Err(Error::NotRecording);
        }
        self.state = ReplayerState::Paused;
        let mut traces = IndexMap::new();
        let mut first_error = None;
        for (name, editor) in &mut self.editors {
            match editor.stop() {
                Ok(trace) => {
                    traces.insert(name.clone(), trace);
                }
                Err(err) => {
                    tracing::warn!(editor = %name, %err, "editor failed to stop");
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(traces),
        }
    }

    fn play(&mut self) -> Result<()> {
        self.expect(ReplayerState::Paused)?;
        let names = self.editor_names();
        for (started, name) in names.iter().enumerate() {
            let result = self.editor_mut(name).and_then(|editor| editor.play());
            if let Err(err) = result {
                for name in &names[..started] {
                    if let Some(editor) = self.editors.get_mut(name) {
                        editor.pause();
                    }
                }
                return Err(err);
            }
        }
        self.state = ReplayerState::Playing;
        self.follow_editors();
        Ok(())
    }

    fn pause(&mut self) {
        for editor in self.editors.values_mut() {
            editor.pause();
        }
        if self.state == ReplayerState::Playing {
            self.state = ReplayerState::Paused;
        }
    }

    fn sync(&mut self) -> Result<()> {
        for editor in self.editors.values_mut() {
            editor.sync()?;
        }
        self.follow_editors();
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        for editor in self.editors.values_mut() {
            editor.tick()?;
        }
        self.follow_editors();
        Ok(())
    }

    fn next_deadline(&self) -> Option<Timestamp> {
        self.editors.values().filter_map(EditorTrack::next_deadline).min()
    }

    fn current_time(&self) -> f64 {
        self.first().map_or(0.0, EditorTrack::current_time)
    }

    /// Seek every editor, each clamped to its own duration.
    fn set_current_time(&mut self, secs: f64) -> Result<()> {
        let duration = self.duration();
        if !secs.is_finite() || secs < 0.0 || secs > duration {
            return Err(Error::OutOfRange {
                target_secs: secs,
                duration_secs: duration,
            });
        }
        for editor in self.editors.values_mut() {
            let target = secs.min(editor.duration());
            editor.set_current_time(target)?;
        }
        self.follow_editors();
        Ok(())
    }

    /// The longest editor duration.
    fn duration(&self) -> f64 {
        self.editors.values().map(EditorTrack::duration).fold(0.0, f64::max)
    }

    fn playback_rate(&self) -> f64 {
        self.first().map_or(1.0, EditorTrack::playback_rate)
    }

    fn set_playback_rate(&mut self, rate: f64) -> Result<()> {
        if !valid_rate(rate) {
            return Err(Error::InvalidPlaybackRate(rate));
        }
        for editor in self.editors.values_mut() {
            editor.set_playback_rate(rate)?;
        }
        Ok(())
    }

    /// All traces, present only when every editor has one.
    fn src(&self) -> Option<Self::Source> {
        if self.editors.is_empty() {
            return None;
        }
        self.editors
            .iter()
            .map(|(name, editor)| editor.src().map(|trace| (name.clone(), trace)))
            .collect()
    }

    /// Load one trace per editor. Editors missing from `src` are cleared.
    fn set_src(&mut self, src: Option<Self::Source>) -> Result<()> {
        if self.state != ReplayerState::Paused {
            return Err(Error::SourceLocked(self.state.as_str()));
        }
        if let Some(src) = &src {
            if let Some(unknown) = src.keys().find(|name| !self.editors.contains_key(*name)) {
                return Err(Error::UnknownEditor(unknown.clone()));
            }
        }
        for (name, editor) in &mut self.editors {
            let trace = src.as_ref().and_then(|src| src.get(name)).cloned();
            editor.set_src(trace)?;
        }
        Ok(())
    }

    fn trace_durations(source: &Self::Source) -> Vec<(String, i64)> {
        source
            .iter()
            .map(|(name, trace)| (name.clone(), trace.duration_ms()))
            .collect()
    }
}
