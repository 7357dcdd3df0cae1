//! Derived playback index and the per-second seek table.

use crate::error::{Error, Result};
use rewind_core::Trace;

/// Position of one record in the trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub is_checkpoint: bool,
    pub offset_ms: i64,
}

/// Record offsets plus a second-granularity table of checkpoints.
///
/// `buckets[s]` is the index of the latest checkpoint whose offset is at
/// most `s * 1000` ms, or 0 when no checkpoint precedes that second.
#[derive(Clone, Debug, Default)]
pub struct PlaybackIndex {
    entries: Vec<IndexEntry>,
    buckets: Vec<usize>,
}

impl PlaybackIndex {
    pub fn build(trace: &Trace) -> Self {
        let start = trace.start_time();
        let entries: Vec<IndexEntry> = trace
            .records()
            .iter()
            .map(|record| IndexEntry {
                is_checkpoint: record.is_checkpoint(),
                offset_ms: (record.timestamp() - start).num_milliseconds(),
            })
            .collect();

        let seconds = trace.duration_ms().max(0) / 1000;
        let mut buckets = Vec::with_capacity(seconds as usize + 1);
        let mut latest = 0;
        let mut next = 0;
        for second in 0..=seconds {
            let limit = second * 1000;
            while next < entries.len() && entries[next].offset_ms <= limit {
                if entries[next].is_checkpoint {
                    latest = next;
                }
                next += 1;
            }
            buckets.push(latest);
        }

        Self { entries, buckets }
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn offset_ms(&self, index: usize) -> Option<i64> {
        self.entries.get(index).map(|entry| entry.offset_ms)
    }

    /// Seed index for a whole second.
    pub fn bucket(&self, second: usize) -> Option<usize> {
        self.buckets.get(second).copied()
    }

    /// Index of the latest checkpoint at or before `target_ms`.
    ///
    /// Starts from the target's bucket and scans forward.
    pub fn seek(&self, target_ms: f64) -> Result<usize> {
        let second = (target_ms / 1000.0).floor();
        let start = if second >= 0.0 {
            self.bucket(second as usize)
        } else {
            None
        };
        let start = start.ok_or(Error::OutOfRange {
            target_secs: target_ms / 1000.0,
            duration_secs: self.entries.last().map_or(0.0, |entry| entry.offset_ms as f64 / 1000.0),
        })?;

        if self.entries[start].offset_ms as f64 > target_ms {
            return Err(Error::BadIndex {
                index: start,
                target_ms,
            });
        }

        let mut found = start;
        for (index, entry) in self.entries.iter().enumerate().skip(start) {
            if entry.offset_ms as f64 > target_ms {
                break;
            }
            if entry.is_checkpoint {
                found = index;
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_core::time::from_epoch_millis;
    use rewind_core::{
        CheckpointReason, Complete, CursorChange, EditorLocation, Record, ScrollPosition, Selection, WindowSize,
    };

    fn checkpoint(millis: i64) -> Record {
        Record::Complete(Complete {
            timestamp: from_epoch_millis(millis),
            focused: true,
            value: String::new(),
            selection: Selection::default(),
            cursor: EditorLocation::default(),
            scroll: ScrollPosition::default(),
            window: WindowSize::default(),
            reason: CheckpointReason::Timer,
            session_name: None,
            session_info: Vec::new(),
        })
    }

    fn cursor(millis: i64) -> Record {
        Record::CursorChange(CursorChange {
            timestamp: from_epoch_millis(millis),
            focused: true,
            location: EditorLocation::default(),
        })
    }

    fn index() -> PlaybackIndex {
        let trace = Trace::from_records(vec![
            checkpoint(0),
            cursor(400),
            checkpoint(1_000),
            cursor(1_200),
            checkpoint(2_500),
            cursor(2_600),
            cursor(3_700),
        ])
        .unwrap();
        PlaybackIndex::build(&trace)
    }

    #[test]
    fn test_buckets() {
        let index = index();
        assert_eq!(index.bucket(0), Some(0));
        assert_eq!(index.bucket(1), Some(2));
        assert_eq!(index.bucket(2), Some(2));
        assert_eq!(index.bucket(3), Some(4));
        assert_eq!(index.bucket(4), None);
    }

    #[test]
    fn test_seek_finds_latest_checkpoint() {
        let index = index();
        assert_eq!(index.seek(0.0).unwrap(), 0);
        assert_eq!(index.seek(999.0).unwrap(), 0);
        assert_eq!(index.seek(1_000.0).unwrap(), 2);
        assert_eq!(index.seek(2_499.0).unwrap(), 2);
        assert_eq!(index.seek(2_500.0).unwrap(), 4);
        assert_eq!(index.seek(3_700.0).unwrap(), 4);
    }

    #[test]
    fn test_last_second_boundary() {
        // Duration 3700ms: second 3 must still resolve
        let index = index();
        assert_eq!(index.bucket(3), Some(4));
        assert_eq!(index.seek(3_000.0).unwrap(), 4);
    }

    #[test]
    fn test_seek_outside_table() {
        let index = index();
        assert!(matches!(index.seek(4_000.0), Err(Error::OutOfRange { .. })));
        assert!(matches!(index.seek(-1.0), Err(Error::OutOfRange { .. })));
    }
}
