//! Headless replay verification.
//!
//! Replays a trace onto a [`HeadlessEditor`] at rate 1.0 on a manual clock
//! and compares the surface with each checkpoint:
//!
//! - just before a checkpoint is applied, the text rebuilt from deltas must
//!   already match its `value`
//! - once the clock reaches a checkpoint's offset, the surface must match its
//!   `value`, `cursor` and `selection`

use parking_lot::Mutex;
use rewind_core::surface::shared;
use rewind_core::{Complete, EditorSurface, ManualClock, PlayerConfig, Record, Trace};
use rewind_recorder::testing::HeadlessEditor;
use rewind_recorder::Player;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// One checkpoint the replay did not reproduce.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Divergence {
    pub index: usize,
    pub offset_ms: i64,
    pub field: &'static str,
    pub expected: String,
    pub found: String,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "record {} at {}ms: {} expected {}, replay has {}",
            self.index, self.offset_ms, self.field, self.expected, self.found
        )
    }
}

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Replay failed: {0}")]
    Replay(#[from] rewind_recorder::Error),

    #[error("{} checkpoint(s) not reproduced, first: {}", .0.len(), .0[0])]
    Diverged(Vec<Divergence>),
}

/// Outcome of a successful verification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Checkpoints compared before application
    pub rebuilt: usize,
    /// Checkpoints sampled at their offset
    pub sampled: usize,
    /// Checkpoints in another session than the surface was showing
    pub skipped: usize,
}

/// Replay `trace` headlessly and check it reproduces its checkpoints.
pub fn verify(trace: Arc<Trace>, config: &PlayerConfig) -> Result<VerifyReport, VerifyError> {
    let clock = ManualClock::at_epoch_millis(0);
    let surface = shared(HeadlessEditor::new(""));
    let config = PlayerConfig {
        playback_rate: 1.0,
        ..config.clone()
    };
    let mut player = Player::new(Arc::clone(&surface), clock.shared(), config);

    let divergences = Arc::new(Mutex::new(Vec::new()));
    let report = Arc::new(Mutex::new(VerifyReport::default()));
    {
        let trace = Arc::clone(&trace);
        let surface = Arc::clone(&surface);
        let divergences = Arc::clone(&divergences);
        let report = Arc::clone(&report);
        let mut index = 0;
        player.set_filter(move |record| {
            let current = index;
            index += 1;
            if current == 0 {
                return true;
            }
            if let Record::Complete(complete) = record {
                let editor = surface.lock();
                if in_other_session(&*editor, complete) {
                    report.lock().skipped += 1;
                } else {
                    let offset_ms = trace.offset_ms(current).unwrap_or_default();
                    if editor.text() != complete.value {
                        divergences.lock().push(Divergence {
                            index: current,
                            offset_ms,
                            field: "value",
                            expected: format!("{:?}", complete.value),
                            found: format!("{:?}", editor.text()),
                        });
                    }
                    report.lock().rebuilt += 1;
                }
            }
            true
        });
    }

    player.load(Some(Arc::clone(&trace)))?;
    player.play()?;

    let mut elapsed = 0;
    for index in sample_points(&trace) {
        let (Some(offset_ms), Some(complete)) = (trace.offset_ms(index), trace.records()[index].as_complete()) else {
            continue;
        };
        clock.advance(offset_ms - elapsed);
        elapsed = offset_ms;
        player.tick()?;

        let editor = surface.lock();
        let mut push = |field, expected: String, found: String| {
            if expected != found {
                divergences.lock().push(Divergence {
                    index,
                    offset_ms,
                    field,
                    expected,
                    found,
                });
            }
        };
        push("value", format!("{:?}", complete.value), format!("{:?}", editor.text()));
        push("cursor", format!("{:?}", complete.cursor), format!("{:?}", editor.cursor()));
        push(
            "selection",
            format!("{:?}", complete.selection),
            format!("{:?}", editor.selection()),
        );
        report.lock().sampled += 1;
    }

    let divergences = std::mem::take(&mut *divergences.lock());
    if !divergences.is_empty() {
        for divergence in &divergences {
            tracing::warn!(%divergence, "checkpoint not reproduced");
        }
        return Err(VerifyError::Diverged(divergences));
    }
    let report = report.lock().clone();
    Ok(report)
}

/// Checkpoints that are the last record at their offset.
fn sample_points(trace: &Trace) -> Vec<usize> {
    let records = trace.records();
    (0..records.len())
        .filter(|&index| records[index].is_checkpoint())
        .filter(|&index| match trace.offset_ms(index + 1) {
            Some(next) => trace.offset_ms(index).map_or(false, |offset| next > offset),
            None => true,
        })
        .collect()
}

fn in_other_session<S: EditorSurface + ?Sized>(surface: &S, complete: &Complete) -> bool {
    complete
        .session_name
        .as_deref()
        .map_or(false, |name| surface.active_session() != name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_core::time::from_epoch_millis;
    use rewind_core::{
        CheckpointReason, Delta, EditorLocation, ScrollPosition, Selection, SessionInfo, TextEdit, WindowSize,
    };
    use rewind_recorder::testing::pump;
    use rewind_recorder::Recorder;

    fn complete(millis: i64, value: &str, reason: CheckpointReason) -> Record {
        Record::Complete(Complete {
            timestamp: from_epoch_millis(millis),
            focused: true,
            value: value.to_string(),
            selection: Selection::default(),
            cursor: EditorLocation::default(),
            scroll: ScrollPosition::default(),
            window: WindowSize::default(),
            reason,
            session_name: None,
            session_info: Vec::new(),
        })
    }

    fn insert(millis: i64, column: usize, text: &str) -> Record {
        Record::Delta(Delta {
            timestamp: from_epoch_millis(millis),
            focused: true,
            edit: TextEdit::insert(EditorLocation::new(0, column), text),
            id: None,
        })
    }

    #[test]
    fn test_recorded_trace_verifies() {
        let clock = ManualClock::at_epoch_millis(0);
        let mut recorder = Recorder::new(shared(HeadlessEditor::new("")), clock.shared());
        recorder
            .add_sessions(vec![SessionInfo::new("a", "", "text"), SessionInfo::new("b", "b", "text")])
            .unwrap();
        recorder.set_session("a").unwrap();
        recorder.start().unwrap();
        for (step, text) in ["x", "y", "z"].iter().enumerate() {
            clock.advance(700);
            recorder.tick().unwrap();
            recorder.surface().lock().insert(EditorLocation::new(0, step), text);
            pump(&mut recorder).unwrap();
        }
        clock.advance(200);
        recorder.set_session("b").unwrap();
        pump(&mut recorder).unwrap();
        clock.advance(700);
        recorder.tick().unwrap();
        let trace = recorder.stop().unwrap();

        let report = verify(trace, &PlayerConfig::default()).unwrap();
        assert!(report.rebuilt >= 2);
        assert!(report.sampled >= 3);
    }

    #[test]
    fn test_divergent_checkpoint_reported() {
        let trace = Trace::from_records(vec![
            complete(0, "", CheckpointReason::Start),
            insert(500, 0, "a"),
            complete(1_000, "ab", CheckpointReason::Timer),
            complete(1_500, "ab", CheckpointReason::End),
        ])
        .unwrap();

        match verify(Arc::new(trace), &PlayerConfig::default()) {
            Err(VerifyError::Diverged(divergences)) => {
                assert_eq!(divergences.len(), 1);
                assert_eq!(divergences[0].index, 2);
                assert_eq!(divergences[0].field, "value");
                assert_eq!(divergences[0].found, "\"a\"");
            }
            other => panic!("expected divergence, got {other:?}"),
        }
    }

    #[test]
    fn test_same_offset_records_sampled_once() {
        let trace = Trace::from_records(vec![
            complete(0, "", CheckpointReason::Start),
            complete(1_000, "", CheckpointReason::Timer),
            insert(1_000, 0, "a"),
            complete(2_000, "a", CheckpointReason::End),
        ])
        .unwrap();
        assert_eq!(sample_points(&trace), vec![0, 3]);
        assert_eq!(
            verify(Arc::new(trace), &PlayerConfig::default()).unwrap(),
            VerifyReport {
                rebuilt: 2,
                sampled: 2,
                skipped: 0
            }
        );
    }
}
