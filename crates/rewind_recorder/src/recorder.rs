//! Buffers streamed records, injects checkpoints and builds traces.

use crate::error::{Error, Result};
use crate::streamer::Streamer;
use indexmap::IndexMap;
use rewind_core::surface::session_info;
use rewind_core::time::add_millis;
use rewind_core::{
    CheckpointReason, EditorSurface, ExternalChange, Record, RecorderOptions, SessionInfo, SharedClock,
    SharedSurface, SurfaceEvent, Timestamp, Trace, TraceError,
};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Recorder state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    /// Not recording
    Idle,
    /// Capturing records
    Recording,
}

impl RecorderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecorderState::Idle => "idle",
            RecorderState::Recording => "recording",
        }
    }
}

type RecordListener = Box<dyn FnMut(&Record)>;

/// Records one editing surface into a [`Trace`].
pub struct Recorder<S: EditorSurface> {
    surface: SharedSurface<S>,
    clock: SharedClock,
    streamer: Streamer,
    options: RecorderOptions,
    state: RecorderState,
    records: Vec<Record>,
    /// Registered session names and their modes, in registration order
    sessions: IndexMap<String, String>,
    session_name: Option<String>,
    start_session: Option<String>,
    trace_sessions: Vec<SessionInfo>,
    next_checkpoint: Option<Timestamp>,
    since_checkpoint: usize,
    last_timestamp: Option<Timestamp>,
    listeners: Vec<RecordListener>,
    trace: Option<Arc<Trace>>,
}

impl<S: EditorSurface> Recorder<S> {
    pub fn new(surface: SharedSurface<S>, clock: SharedClock) -> Self {
        Self::with_options(surface, clock, RecorderOptions::default())
    }

    pub fn with_options(surface: SharedSurface<S>, clock: SharedClock, options: RecorderOptions) -> Self {
        let streamer = Streamer::new(Arc::clone(&clock), options.streamer.clone());
        Self {
            surface,
            clock,
            streamer,
            options,
            state: RecorderState::Idle,
            records: Vec::new(),
            sessions: IndexMap::new(),
            session_name: None,
            start_session: None,
            trace_sessions: Vec::new(),
            next_checkpoint: None,
            since_checkpoint: 0,
            last_timestamp: None,
            listeners: Vec::new(),
            trace: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    pub fn options(&self) -> &RecorderOptions {
        &self.options
    }

    /// Options used by the next [`start`](Self::start).
    pub fn set_options(&mut self, options: RecorderOptions) -> Result<()> {
        options.validate().map_err(Error::InvalidOptions)?;
        self.options = options;
        Ok(())
    }

    pub fn surface(&self) -> &SharedSurface<S> {
        &self.surface
    }

    /// The last completed trace.
    pub fn trace(&self) -> Option<Arc<Trace>> {
        self.trace.clone()
    }

    /// Registered session names.
    pub fn sessions(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }

    /// Label of the active session, if sessions are named.
    pub fn session_name(&self) -> Option<&str> {
        self.session_name.as_deref()
    }

    /// Records captured so far in the current recording.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Observe every appended record.
    pub fn add_record_listener(&mut self, listener: impl FnMut(&Record) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Start recording with the current options.
    pub fn start(&mut self) -> Result<()> {
        let options = self.options.clone();
        self.start_with(options)
    }

    /// Start recording.
    pub fn start_with(&mut self, options: RecorderOptions) -> Result<()> {
        if self.is_recording() {
            return Err(Error::InvalidState {
                expected: RecorderState::Idle.as_str(),
                found: self.state.as_str(),
            });
        }
        options.validate().map_err(Error::InvalidOptions)?;
        if !self.sessions.is_empty() && self.session_name.is_none() {
            return Err(Error::SessionLabelRequired);
        }

        let surface = Arc::clone(&self.surface);
        let mut surface = surface.lock();

        self.streamer = Streamer::new(Arc::clone(&self.clock), options.streamer.clone());
        self.options = options;
        self.records.clear();
        self.trace = None;
        self.since_checkpoint = 0;
        self.last_timestamp = None;

        self.trace_sessions = if self.sessions.is_empty() {
            vec![SessionInfo::new("", surface.text(), surface.mode())]
        } else {
            self.session_snapshot(&*surface)
        };
        self.start_session = self.session_name.clone();
        self.streamer.set_session_name(self.session_name.clone());

        let start = self.streamer.start(&mut *surface)?;
        self.state = RecorderState::Recording;
        self.append(&*surface, start);

        let now = self.clock.now();
        self.next_checkpoint = self.checkpoint_period().map(|period| add_millis(now, period as f64));
        tracing::debug!(
            session = ?self.start_session,
            interval_ms = self.options.checkpoint_interval_ms,
            event_count = ?self.options.checkpoint_event_count,
            "recording started"
        );
        Ok(())
    }

    /// Stop recording and build the trace.
    ///
    /// The recording always ends, even when the trace fails validation.
    pub fn stop(&mut self) -> Result<Arc<Trace>> {
        if !self.is_recording() {
            return Err(Error::NotRecording);
        }
        let surface = Arc::clone(&self.surface);
        let mut surface = surface.lock();

        self.next_checkpoint = None;
        let end = self.streamer.stop(&mut *surface);
        if let Ok(end) = end {
            self.append(&*surface, end);
        }
        self.state = RecorderState::Idle;

        let records = std::mem::take(&mut self.records);
        let session_name = self.start_session.clone().unwrap_or_default();
        let trace = Arc::new(Trace::new(records, self.trace_sessions.clone(), session_name)?);
        tracing::debug!(
            records = trace.len(),
            duration_ms = trace.duration_ms(),
            "recording stopped"
        );
        self.trace = Some(Arc::clone(&trace));
        Ok(trace)
    }

    /// Forward a surface notification.
    pub fn handle(&mut self, event: &SurfaceEvent) -> Result<()> {
        if !self.is_recording() {
            return Ok(());
        }
        let surface = Arc::clone(&self.surface);
        let mut surface = surface.lock();
        let records = self.streamer.handle(&mut *surface, event)?;
        if let SurfaceEvent::SessionChanged { name } = event {
            if self.session_name.is_some() {
                self.session_name = Some(name.clone());
            }
        }
        for record in records {
            self.append(&*surface, record);
        }
        Ok(())
    }

    /// Fire due throttled evaluations and the checkpoint timer.
    pub fn tick(&mut self) -> Result<()> {
        if !self.is_recording() {
            return Ok(());
        }
        let surface = Arc::clone(&self.surface);
        let mut surface = surface.lock();
        for record in self.streamer.tick(&mut *surface) {
            self.append(&*surface, record);
        }

        let now = self.clock.now();
        if let (Some(due), Some(period)) = (self.next_checkpoint, self.checkpoint_period()) {
            if due <= now {
                self.push_checkpoint(&*surface, CheckpointReason::Timer);
                let next = add_millis(due, period as f64);
                self.next_checkpoint = Some(if next <= now { add_millis(now, period as f64) } else { next });
            }
        }
        Ok(())
    }

    /// Earliest pending timer.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        if !self.is_recording() {
            return None;
        }
        [self.streamer.next_deadline(), self.next_checkpoint]
            .into_iter()
            .flatten()
            .min()
    }

    /// Insert a manual checkpoint.
    pub fn add_checkpoint(&mut self) -> Result<()> {
        if !self.is_recording() {
            return Err(Error::NotRecording);
        }
        let surface = Arc::clone(&self.surface);
        let surface = surface.lock();
        self.push_checkpoint(&*surface, CheckpointReason::Manual);
        Ok(())
    }

    /// Record a caller-supplied event.
    ///
    /// `timestamp` and `focused` in the payload are replaced by the recorder.
    pub fn add_external(&mut self, mut payload: Map<String, Value>) -> Result<()> {
        if !self.is_recording() {
            return Err(Error::NotRecording);
        }
        if payload.contains_key("type") {
            return Err(Error::ExternalTypeCollision);
        }
        payload.remove("timestamp");
        payload.remove("focused");

        let surface = Arc::clone(&self.surface);
        let surface = surface.lock();
        let record = Record::External(ExternalChange {
            timestamp: self.clock.now(),
            focused: surface.is_focused(),
            payload,
        });
        self.append(&*surface, record);
        Ok(())
    }

    /// Register a named session.
    ///
    /// Registering while recording captures the new baseline in a session checkpoint.
    pub fn add_session(&mut self, info: SessionInfo) -> Result<()> {
        self.add_sessions(vec![info])
    }

    /// Register several sessions, taking at most one checkpoint.
    pub fn add_sessions(&mut self, infos: Vec<SessionInfo>) -> Result<()> {
        for (i, info) in infos.iter().enumerate() {
            if info.name.trim().is_empty() {
                return Err(TraceError::BlankSessionName.into());
            }
            if self.sessions.contains_key(&info.name) || infos[..i].iter().any(|other| other.name == info.name) {
                return Err(Error::DuplicateSession(info.name.clone()));
            }
        }
        if self.is_recording() && self.session_name.is_none() {
            return Err(Error::SessionLabelRequired);
        }
        if infos.is_empty() {
            return Ok(());
        }

        let surface = Arc::clone(&self.surface);
        let mut surface = surface.lock();
        for info in &infos {
            surface.create_session(info);
            self.sessions.insert(info.name.clone(), info.mode.clone());
            tracing::debug!(session = %info.name, "session registered");
        }
        if self.is_recording() {
            self.trace_sessions.extend(infos);
            self.push_checkpoint(&*surface, CheckpointReason::Session);
        }
        Ok(())
    }

    /// Unregister a session other than the active one.
    pub fn delete_session(&mut self, name: &str) -> Result<()> {
        if !self.sessions.contains_key(name) {
            return Err(Error::UnknownSession(name.to_string()));
        }
        if self.session_name.as_deref() == Some(name) {
            return Err(Error::ActiveSession(name.to_string()));
        }
        self.surface.lock().remove_session(name)?;
        self.sessions.shift_remove(name);
        Ok(())
    }

    /// Switch the surface to a registered session.
    ///
    /// While recording, the surface's session notification produces the
    /// session checkpoint.
    pub fn set_session(&mut self, name: &str) -> Result<()> {
        if !self.sessions.contains_key(name) {
            return Err(Error::UnknownSession(name.to_string()));
        }
        self.surface.lock().switch_session(name)?;
        self.session_name = Some(name.to_string());
        self.streamer.set_session_name(Some(name.to_string()));
        Ok(())
    }

    fn checkpoint_period(&self) -> Option<i64> {
        Some(self.options.checkpoint_interval_ms).filter(|interval| *interval > 0)
    }

    fn session_snapshot(&self, surface: &S) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|(name, mode)| {
                session_info(surface, name).unwrap_or_else(|| SessionInfo::new(name.clone(), "", mode.clone()))
            })
            .collect()
    }

    fn push_checkpoint(&mut self, surface: &S, reason: CheckpointReason) {
        let complete = self.streamer.checkpoint(surface, reason);
        self.append(surface, Record::Complete(complete));
    }

    fn append(&mut self, surface: &S, mut record: Record) {
        if let Some(last) = self.last_timestamp {
            if record.timestamp() < last {
                record.set_timestamp(last);
            }
        }
        self.last_timestamp = Some(record.timestamp());

        if let Record::Complete(complete) = &mut record {
            complete.session_info = self.session_snapshot(surface);
            self.since_checkpoint = 0;
        } else {
            self.since_checkpoint += 1;
        }
        tracing::trace!(kind = %record.kind(), "record appended");

        for listener in &mut self.listeners {
            listener(&record);
        }
        self.records.push(record);

        if let Some(count) = self.options.checkpoint_event_count {
            if self.since_checkpoint >= count {
                self.push_checkpoint(surface, CheckpointReason::Counter);
            }
        }
    }
}
