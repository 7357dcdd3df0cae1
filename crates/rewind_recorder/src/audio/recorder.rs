use super::{AudioClip, AudioInput};
use crate::error::{Error, Result};
use rewind_core::time::millis_between;
use rewind_core::{SharedClock, Timestamp};

/// Captures one clip at a time from an [`AudioInput`].
///
/// Containers written by streaming encoders often carry no usable duration,
/// so the recorder measures the wall-clock time between start and stop and
/// stamps it on the clip.
pub struct AudioRecorder<I: AudioInput> {
    input: I,
    clock: SharedClock,
    started: Option<Timestamp>,
}

impl<I: AudioInput> AudioRecorder<I> {
    pub fn new(input: I, clock: SharedClock) -> Self {
        Self {
            input,
            clock,
            started: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.started.is_some()
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    /// Acquire the device and start capturing.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_recording() {
            return Err(Error::InvalidState {
                expected: "stopped",
                found: "recording",
            });
        }
        self.input.start().await?;
        self.started = Some(self.clock.now());
        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing and return the clip with its measured duration.
    pub async fn stop(&mut self) -> Result<AudioClip> {
        let Some(started) = self.started.take() else {
            return Err(Error::NotRecording);
        };
        let mut clip = self.input.stop().await?;
        let measured = millis_between(started, self.clock.now());
        if clip.duration_ms != measured {
            tracing::debug!(reported = clip.duration_ms, measured, "audio duration corrected");
        }
        clip.duration_ms = measured;
        Ok(clip)
    }
}
