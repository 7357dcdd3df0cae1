//! Integration tests for replaying recorded traces
//!
//! These tests verify that:
//! - Replay at rate 1.0 reproduces every checkpoint
//! - Seeking lands between the right records, including in the last second
//! - Rate changes do not move the playback position
//! - Checkpoints can be applied repeatedly

use pretty_assertions::assert_eq;
use rewind_core::surface::shared;
use rewind_core::{
    apply_record, ApplyMode, EditorLocation, EditorSurface, ManualClock, PlayerConfig, Record, Selection, Trace,
};
use rewind_recorder::testing::{pump, HeadlessEditor};
use rewind_recorder::{Error, Player, Recorder};
use std::sync::Arc;

/// 4.35 seconds of typing, cursor moves and a selection, with timer checkpoints
fn recorded_trace() -> Arc<Trace> {
    let clock = ManualClock::at_epoch_millis(1_700_000_000_000);
    let mut recorder = Recorder::new(shared(HeadlessEditor::new("let")), clock.shared());
    recorder.start().unwrap();

    for step in 1..=43usize {
        clock.advance(100);
        {
            let surface = recorder.surface();
            let mut editor = surface.lock();
            let end = editor.text().chars().count();
            match step {
                3 => editor.insert(EditorLocation::new(0, end), " x"),
                13 => editor.insert(EditorLocation::new(0, end), " = 1;"),
                17 => editor.insert(EditorLocation::new(0, end), "\nlet y = x;"),
                26 => editor.move_cursor(EditorLocation::new(0, 0)),
                31 => editor.select(Selection::new(EditorLocation::new(0, 4), EditorLocation::new(0, 5))),
                38 => editor.delete(EditorLocation::new(1, 0), "let "),
                _ => {}
            }
        }
        pump(&mut recorder).unwrap();
        recorder.tick().unwrap();
    }
    clock.advance(50);
    recorder.stop().unwrap()
}

fn player(trace: Arc<Trace>) -> (Player<HeadlessEditor>, ManualClock) {
    let clock = ManualClock::at_epoch_millis(0);
    let mut player = Player::new(shared(HeadlessEditor::new("")), clock.shared(), PlayerConfig::default());
    player.load(Some(trace)).unwrap();
    (player, clock)
}

#[test]
fn test_replay_reproduces_checkpoints() {
    let trace = recorded_trace();
    assert_eq!(trace.duration_ms(), 4_350);
    let (mut player, clock) = player(Arc::clone(&trace));
    player.play().unwrap();

    let mut elapsed = 0;
    let mut checked = 0;
    for (index, record) in trace.records().iter().enumerate() {
        let Record::Complete(complete) = record else {
            continue;
        };
        let offset = trace.offset_ms(index).unwrap();
        clock.advance(offset - elapsed);
        elapsed = offset;
        player.tick().unwrap();

        let editor = player.surface().lock();
        assert_eq!(editor.text(), complete.value, "value at {offset}ms");
        assert_eq!(editor.cursor(), complete.cursor, "cursor at {offset}ms");
        assert_eq!(editor.selection(), complete.selection, "selection at {offset}ms");
        checked += 1;
    }
    assert!(checked >= 6, "start, end and four timer checkpoints");
    assert!(!player.is_playing());
}

#[test]
fn test_seek_lands_between_records() {
    let trace = recorded_trace();
    let (mut player, _) = player(Arc::clone(&trace));
    let duration = trace.duration_ms();

    let targets = (0..=duration).step_by(50).chain([999, 1_000, 1_001, 4_001, 4_349, duration]);
    for target in targets {
        player.set_current_time(target as f64 / 1000.0).unwrap();
        player.sync().unwrap();

        let next = player.current_index();
        assert!(next > 0, "the starting checkpoint is always applied");
        assert!(trace.offset_ms(next - 1).unwrap() <= target, "applied record after {target}ms");
        if let Some(offset) = trace.offset_ms(next) {
            assert!(offset > target, "pending record at or before {target}ms");
        }
    }
}

#[test]
fn test_seek_restores_state_at_target() {
    let trace = recorded_trace();
    let (mut player, _) = player(Arc::clone(&trace));

    player.set_current_time(4.35).unwrap();
    player.sync().unwrap();
    assert_eq!(player.surface().lock().text(), "let x = 1;\ny = x;");

    player.set_current_time(1.0).unwrap();
    player.sync().unwrap();
    assert_eq!(player.surface().lock().text(), "let x");
}

#[test]
fn test_seek_out_of_range() {
    let trace = recorded_trace();
    let (mut player, _) = player(trace);

    let err = player.set_current_time(4.3505).unwrap_err();
    assert!(matches!(err, Error::OutOfRange { duration_secs, .. } if duration_secs == 4.35));
    assert!(matches!(player.set_current_time(-0.001), Err(Error::OutOfRange { .. })));
    assert_eq!(player.current_time(), 0.0);
}

#[test]
fn test_rate_change_keeps_position() {
    let trace = recorded_trace();
    let (mut player, clock) = player(trace);
    player.play().unwrap();

    clock.advance(1_500);
    player.tick().unwrap();
    assert!((player.current_time() - 1.5).abs() < 1e-3);

    player.set_playback_rate(2.0).unwrap();
    assert!((player.current_time() - 1.5).abs() < 1e-3);
    assert!(player.is_playing());

    clock.advance(500);
    player.tick().unwrap();
    assert!((player.current_time() - 2.5).abs() < 1e-3);

    player.set_playback_rate(0.5).unwrap();
    assert!((player.current_time() - 2.5).abs() < 1e-3);
}

#[test]
fn test_checkpoint_application_is_idempotent() {
    let trace = recorded_trace();
    let complete = trace
        .records()
        .iter()
        .rev()
        .find(|record| record.is_checkpoint())
        .unwrap();

    let mut editor = HeadlessEditor::new("something else");
    let state = |editor: &HeadlessEditor| (editor.text(), editor.cursor(), editor.selection(), editor.scroll());

    apply_record(&mut editor, complete, ApplyMode::default()).unwrap();
    let first = state(&editor);
    apply_record(&mut editor, complete, ApplyMode::default()).unwrap();
    assert_eq!(state(&editor), first);
}
