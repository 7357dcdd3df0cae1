//! Subcommand implementations

use anyhow::{Context, Result};
use rewind_core::{RewindConfig, Trace};
use rewind_recorder::AudioClip;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::verify::{self, VerifyReport};

/// A trace and the audio recorded alongside it, in one JSON document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub trace: Trace,
    pub audio: AudioClip,
}

pub fn read_trace(path: &Path) -> Result<Trace> {
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Trace::from_json(&json).with_context(|| format!("Invalid trace {}", path.display()))
}

/// Human-readable summary of a trace.
pub fn inspect(path: &Path) -> Result<String> {
    let trace = read_trace(path)?;
    let summary = trace.summary();

    let mut out = String::new();
    writeln!(out, "{}", path.display())?;
    writeln!(out, "  start:       {}", summary.start_time.to_rfc3339())?;
    writeln!(out, "  duration:    {:.3}s", summary.duration_ms as f64 / 1000.0)?;
    writeln!(out, "  records:     {} ({} checkpoints)", summary.records, summary.checkpoints)?;
    for (kind, count) in &summary.counts {
        writeln!(out, "    {:<16}{count}", kind.as_str())?;
    }
    if !summary.sessions.is_empty() {
        writeln!(out, "  sessions:    {}", summary.sessions.join(", "))?;
        writeln!(out, "  started in:  {}", trace.session_name())?;
    }
    Ok(out)
}

/// Decode every trace, reporting each failure.
pub fn validate(paths: &[PathBuf]) -> Result<()> {
    let mut invalid = 0;
    for path in paths {
        match read_trace(path) {
            Ok(trace) => tracing::info!(path = %path.display(), records = trace.len(), "valid"),
            Err(err) => {
                invalid += 1;
                tracing::error!(path = %path.display(), "{err:#}");
            }
        }
    }
    if invalid > 0 {
        anyhow::bail!("{invalid} of {} traces invalid", paths.len());
    }
    Ok(())
}

/// Replay a trace headlessly against its own checkpoints.
pub fn verify(path: &Path, config: &RewindConfig) -> Result<VerifyReport> {
    let trace = read_trace(path)?;
    let report = verify::verify(Arc::new(trace), &config.player)
        .with_context(|| format!("Replay of {} diverged", path.display()))?;
    tracing::info!(
        rebuilt = report.rebuilt,
        sampled = report.sampled,
        skipped = report.skipped,
        "trace verified"
    );
    Ok(report)
}

/// Options for [`bundle`].
#[derive(Clone, Debug)]
pub struct BundleArgs {
    pub trace: PathBuf,
    pub audio: PathBuf,
    pub mime_type: String,
    /// Defaults to the trace duration
    pub duration_ms: Option<i64>,
    pub output: PathBuf,
}

/// Pack a trace and an audio file into a bundle.
pub fn bundle(args: &BundleArgs, config: &RewindConfig) -> Result<Bundle> {
    let trace = read_trace(&args.trace)?;
    let data = fs::read(&args.audio).with_context(|| format!("Failed to read {}", args.audio.display()))?;
    let duration_ms = args.duration_ms.unwrap_or_else(|| trace.duration_ms());

    let tolerance_ms = config.sync.duration_tolerance_ms;
    if (trace.duration_ms() - duration_ms).abs() > tolerance_ms {
        return Err(rewind_recorder::Error::DurationMismatch {
            editor_ms: trace.duration_ms(),
            audio_ms: duration_ms,
            tolerance_ms,
        }
        .into());
    }

    let bundle = Bundle {
        trace,
        audio: AudioClip::new(data, args.mime_type.clone(), duration_ms),
    };
    let json = serde_json::to_string(&bundle).context("Failed to encode bundle")?;
    fs::write(&args.output, json).with_context(|| format!("Failed to write {}", args.output.display()))?;
    tracing::info!(output = %args.output.display(), bytes = bundle.audio.data.len(), "bundle written");
    Ok(bundle)
}

/// Split a bundle into `trace.json` and an audio file. Returns both paths.
pub fn unbundle(path: &Path, dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let bundle: Bundle = serde_json::from_str(&json).with_context(|| format!("Invalid bundle {}", path.display()))?;

    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let trace_path = dir.join("trace.json");
    fs::write(&trace_path, bundle.trace.to_json_pretty()?)
        .with_context(|| format!("Failed to write {}", trace_path.display()))?;
    let audio_path = dir.join(format!("audio.{}", extension(&bundle.audio.mime_type)));
    fs::write(&audio_path, &bundle.audio.data).with_context(|| format!("Failed to write {}", audio_path.display()))?;
    Ok((trace_path, audio_path))
}

fn extension(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    match essence {
        "audio/webm" | "video/webm" => "webm",
        "audio/ogg" => "ogg",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        _ => "bin",
    }
}
