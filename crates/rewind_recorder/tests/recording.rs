//! Integration tests for recording editing sessions into traces
//!
//! These tests drive a `Recorder` against a `HeadlessEditor` on a manual
//! clock and check the traces it produces.

use pretty_assertions::assert_eq;
use rewind_core::surface::shared;
use rewind_core::{
    CheckpointReason, EditorLocation, EditorSurface, ManualClock, Record, RecordKind, SessionInfo, SurfaceEvent,
    TextEdit, Trace, TraceError,
};
use rewind_recorder::testing::{pump, HeadlessEditor};
use rewind_recorder::Recorder;

fn count(trace: &Trace, kind: RecordKind) -> usize {
    trace.records().iter().filter(|record| record.kind() == kind).count()
}

/// One insertion at 1s and one cursor move at 2s over three seconds
#[test]
fn test_three_second_session() {
    let clock = ManualClock::at_epoch_millis(1_700_000_000_000);
    let mut recorder = Recorder::new(shared(HeadlessEditor::new("hello")), clock.shared());
    recorder.start().unwrap();

    clock.advance(1_000);
    recorder.tick().unwrap();
    // A programmatic insert leaves the local cursor where it was
    let edit = TextEdit::insert(EditorLocation::new(0, 5), " world");
    recorder.surface().lock().apply_edit(&edit).unwrap();
    recorder.handle(&SurfaceEvent::TextChanged(edit)).unwrap();

    clock.advance(1_000);
    recorder.tick().unwrap();
    recorder.surface().lock().move_cursor(EditorLocation::new(0, 11));
    pump(&mut recorder).unwrap();

    clock.advance(1_000);
    recorder.tick().unwrap();
    let trace = recorder.stop().unwrap();

    assert_eq!(count(&trace, RecordKind::Delta), 1);
    assert_eq!(count(&trace, RecordKind::CursorChange), 1);
    assert_eq!(
        count(&trace, RecordKind::Complete),
        trace.len() - 2,
        "everything else is a checkpoint"
    );
    assert!((trace.duration_ms() - 3_000).abs() <= 50);

    let first = trace.records().first().and_then(Record::as_complete).unwrap();
    let last = trace.records().last().and_then(Record::as_complete).unwrap();
    assert_eq!(first.reason, CheckpointReason::Start);
    assert_eq!(first.value, "hello");
    assert_eq!(last.reason, CheckpointReason::End);
    assert_eq!(last.value, "hello world");
    assert_eq!(last.cursor, EditorLocation::new(0, 11));
}

#[test]
fn test_empty_trace_rejected() {
    assert!(matches!(Trace::from_records(Vec::new()), Err(TraceError::Empty)));
}

/// Registering a session mid-recording checkpoints every session's contents
#[test]
fn test_add_session_mid_recording() {
    let clock = ManualClock::at_epoch_millis(0);
    let mut recorder = Recorder::new(shared(HeadlessEditor::new("")), clock.shared());
    recorder.add_session(SessionInfo::new("A", "alpha", "rust")).unwrap();
    recorder.set_session("A").unwrap();
    recorder.start().unwrap();

    clock.advance(500);
    let before = recorder.records().len();
    recorder.add_session(SessionInfo::new("B", "beta", "toml")).unwrap();
    assert_eq!(recorder.records().len(), before + 1);

    let checkpoint = recorder.records().last().and_then(Record::as_complete).unwrap().clone();
    assert_eq!(checkpoint.reason, CheckpointReason::Session);
    assert_eq!(checkpoint.session_name.as_deref(), Some("A"));
    assert_eq!(
        checkpoint.session_info,
        vec![SessionInfo::new("A", "alpha", "rust"), SessionInfo::new("B", "beta", "toml")]
    );

    clock.advance(500);
    let trace = recorder.stop().unwrap();
    assert_eq!(trace.session_name(), "A");
    assert_eq!(
        trace.session_info(),
        &[SessionInfo::new("A", "alpha", "rust"), SessionInfo::new("B", "beta", "toml")]
    );
}

#[test]
fn test_recorded_timestamps_are_monotonic() {
    let clock = ManualClock::at_epoch_millis(0);
    let mut recorder = Recorder::new(shared(HeadlessEditor::new("")), clock.shared());
    recorder.start().unwrap();

    for step in 0..30usize {
        clock.advance(if step == 12 { -400 } else { 70 });
        if step % 3 == 0 {
            let column = recorder.surface().lock().text().chars().count();
            recorder.surface().lock().insert(EditorLocation::new(0, column), "x");
        } else {
            recorder.surface().lock().move_cursor(EditorLocation::new(0, 0));
        }
        pump(&mut recorder).unwrap();
        recorder.tick().unwrap();
    }
    let trace = recorder.stop().unwrap();

    for pair in trace.records().windows(2) {
        assert!(pair[0].timestamp() <= pair[1].timestamp());
    }
}

/// Serializing and decoding keeps records, duration and session metadata
#[test]
fn test_wire_round_trip() {
    let clock = ManualClock::at_epoch_millis(1_700_000_000_000);
    let mut recorder = Recorder::new(shared(HeadlessEditor::new("")), clock.shared());
    recorder
        .add_sessions(vec![SessionInfo::new("main.rs", "fn main() {}", "rust"), SessionInfo::new("README", "", "text")])
        .unwrap();
    recorder.set_session("main.rs").unwrap();
    recorder.start().unwrap();

    clock.advance(250);
    recorder.surface().lock().insert(EditorLocation::new(0, 12), "\n");
    pump(&mut recorder).unwrap();
    clock.advance(250);
    recorder.set_session("README").unwrap();
    pump(&mut recorder).unwrap();
    clock.advance(250);
    recorder.surface().lock().insert(EditorLocation::new(0, 0), "# Title");
    pump(&mut recorder).unwrap();
    clock.advance(1_250);
    recorder.tick().unwrap();
    let trace = recorder.stop().unwrap();

    let decoded = Trace::from_json(&trace.to_json().unwrap()).unwrap();
    assert_eq!(decoded, *trace);
    assert_eq!(decoded.duration_ms(), 2_000);
    assert_eq!(decoded.session_name(), "main.rs");
    assert_eq!(decoded.session_info(), trace.session_info());
}
