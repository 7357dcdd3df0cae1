//! Immutable recorded traces and their wire form.

use crate::error::{Result, TraceError};
use crate::record::{Record, RecordKind, SessionInfo};
use crate::time::{millis_between, wire, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// An immutable, validated sequence of records plus session metadata.
///
/// Constructed once when recording stops (or when decoded from JSON) and
/// never mutated afterwards, so it can be shared freely behind an `Arc`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TraceContent", into = "TraceContent")]
pub struct Trace {
    records: Vec<Record>,
    start_time: Timestamp,
    duration_ms: i64,
    session_info: Vec<SessionInfo>,
    session_name: String,
}

impl Trace {
    /// Build a trace, validating ordering and session metadata.
    pub fn new(
        records: Vec<Record>,
        session_info: Vec<SessionInfo>,
        session_name: impl Into<String>,
    ) -> Result<Self> {
        let session_name = session_name.into();
        let (first, last) = match (records.first(), records.last()) {
            (Some(first), Some(last)) => (first.timestamp(), last.timestamp()),
            _ => return Err(TraceError::Empty),
        };

        for (index, pair) in records.windows(2).enumerate() {
            if pair[1].timestamp() < pair[0].timestamp() {
                return Err(TraceError::Unordered { index: index + 1 });
            }
        }

        validate_sessions(&session_info, &session_name)?;

        Ok(Self {
            duration_ms: millis_between(first, last),
            start_time: first,
            records,
            session_info,
            session_name,
        })
    }

    /// Build a single-session trace with no session metadata.
    pub fn from_records(records: Vec<Record>) -> Result<Self> {
        Self::new(records, Vec::new(), "")
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false; an empty trace cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Timestamp of the first record.
    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    /// Milliseconds from the first to the last record.
    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    pub fn session_info(&self) -> &[SessionInfo] {
        &self.session_info
    }

    /// Session active when recording started.
    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// True when the trace tracks named sessions the player must recreate.
    pub fn has_named_sessions(&self) -> bool {
        self.session_info.iter().any(|info| !info.name.is_empty())
    }

    /// Milliseconds from trace start to record `index`.
    pub fn offset_ms(&self, index: usize) -> Option<i64> {
        self.records
            .get(index)
            .map(|record| millis_between(self.start_time, record.timestamp()))
    }

    /// Decode a trace from its JSON wire form.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode the trace in its JSON wire form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Encode the trace as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Per-kind record counts.
    pub fn summary(&self) -> TraceSummary {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.kind()).or_insert(0) += 1;
        }
        TraceSummary {
            records: self.records.len(),
            checkpoints: counts.get(&RecordKind::Complete).copied().unwrap_or(0),
            duration_ms: self.duration_ms,
            start_time: self.start_time,
            sessions: self.session_info.iter().map(|s| s.name.clone()).collect(),
            counts,
        }
    }
}

fn validate_sessions(session_info: &[SessionInfo], session_name: &str) -> Result<()> {
    if session_info.len() <= 1 {
        return Ok(());
    }
    let mut seen = HashSet::new();
    for info in session_info {
        if info.name.trim().is_empty() {
            return Err(TraceError::BlankSessionName);
        }
        if !seen.insert(info.name.as_str()) {
            return Err(TraceError::DuplicateSession(info.name.clone()));
        }
    }
    if !seen.contains(session_name) {
        return Err(TraceError::MissingStartSession(session_name.to_string()));
    }
    Ok(())
}

/// Aggregate statistics for a trace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceSummary {
    pub records: usize,
    pub checkpoints: usize,
    pub duration_ms: i64,
    pub start_time: Timestamp,
    pub sessions: Vec<String>,
    pub counts: BTreeMap<RecordKind, usize>,
}

/// Wire schema for a trace.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceContent {
    pub records: Vec<Record>,
    /// Informational on input; recomputed from the records.
    #[serde(default)]
    pub duration: i64,
    #[serde(with = "wire")]
    pub start_time: Timestamp,
    #[serde(default)]
    pub session_info: Vec<SessionInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
}

impl TryFrom<TraceContent> for Trace {
    type Error = TraceError;

    fn try_from(content: TraceContent) -> Result<Self> {
        let session_name = content
            .session_name
            .or_else(|| content.session_info.first().map(|info| info.name.clone()))
            .unwrap_or_default();
        let trace = Trace::new(content.records, content.session_info, session_name)?;
        if content.duration != 0 && content.duration != trace.duration_ms {
            tracing::debug!(
                declared = content.duration,
                computed = trace.duration_ms,
                "trace duration recomputed from records"
            );
        }
        Ok(trace)
    }
}

impl From<Trace> for TraceContent {
    fn from(trace: Trace) -> Self {
        Self {
            duration: trace.duration_ms,
            start_time: trace.start_time,
            session_name: Some(trace.session_name),
            session_info: trace.session_info,
            records: trace.records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CursorChange, EditorLocation};
    use crate::time::from_epoch_millis;
    use pretty_assertions::assert_eq;

    fn cursor_at(millis: i64) -> Record {
        Record::CursorChange(CursorChange {
            timestamp: from_epoch_millis(millis),
            focused: true,
            location: EditorLocation::new(0, millis as usize / 100),
        })
    }

    #[test]
    fn test_empty_trace_rejected() {
        let err = Trace::from_records(Vec::new()).unwrap_err();
        assert!(matches!(err, TraceError::Empty));
    }

    #[test]
    fn test_duration_and_offsets() {
        let trace = Trace::from_records(vec![cursor_at(1_000), cursor_at(1_500), cursor_at(4_000)]).unwrap();
        assert_eq!(trace.duration_ms(), 3_000);
        assert_eq!(trace.start_time(), from_epoch_millis(1_000));
        assert_eq!(trace.offset_ms(1), Some(500));
        assert_eq!(trace.offset_ms(3), None);
    }

    #[test]
    fn test_unordered_timestamps_rejected() {
        let err = Trace::from_records(vec![cursor_at(2_000), cursor_at(1_000)]).unwrap_err();
        assert!(matches!(err, TraceError::Unordered { index: 1 }));
    }

    #[test]
    fn test_session_validation() {
        let records = vec![cursor_at(0)];
        let sessions = vec![SessionInfo::new("a", "", "text"), SessionInfo::new("", "", "text")];
        assert!(matches!(
            Trace::new(records.clone(), sessions, "a"),
            Err(TraceError::BlankSessionName)
        ));

        let sessions = vec![SessionInfo::new("a", "", "text"), SessionInfo::new("b", "", "text")];
        assert!(matches!(
            Trace::new(records.clone(), sessions.clone(), "c"),
            Err(TraceError::MissingStartSession(name)) if name == "c"
        ));
        assert!(Trace::new(records.clone(), sessions, "b").is_ok());

        // A single unnamed session is the default recording layout
        let sessions = vec![SessionInfo::new("", "hello", "text")];
        assert!(Trace::new(records, sessions, "").is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let sessions = vec![SessionInfo::new("main", "fn main() {}", "rust")];
        let trace = Trace::new(vec![cursor_at(0), cursor_at(250)], sessions, "main").unwrap();
        let json = trace.to_json().unwrap();
        let decoded = Trace::from_json(&json).unwrap();
        assert_eq!(decoded, trace);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["duration"], serde_json::json!(250));
        assert_eq!(value["sessionName"], serde_json::json!("main"));
        assert_eq!(value["startTime"], serde_json::json!("1970-01-01T00:00:00.000Z"));
    }

    #[test]
    fn test_summary_counts() {
        let trace = Trace::from_records(vec![cursor_at(0), cursor_at(10)]).unwrap();
        let summary = trace.summary();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.checkpoints, 0);
        assert_eq!(summary.counts.get(&RecordKind::CursorChange), Some(&2));
    }
}
