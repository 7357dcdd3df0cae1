//! rewind - tooling for recorded editing sessions
//!
//! Inspects, validates and verifies trace files, and packs traces with
//! their audio into bundles.

mod commands;
mod config;
mod verify;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::BundleArgs;

#[derive(Parser)]
#[command(name = "rewind")]
#[command(about = "Inspect, verify and bundle recorded editing sessions")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./rewind.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging, repeat for trace output
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a summary of a trace
    Inspect {
        trace: PathBuf,
    },

    /// Check that traces decode and satisfy the trace invariants
    Validate {
        #[arg(required = true)]
        traces: Vec<PathBuf>,
    },

    /// Replay a trace headlessly and compare it with its checkpoints
    Verify {
        trace: PathBuf,
    },

    /// Pack a trace and an audio recording into one JSON bundle
    Bundle {
        #[arg(long)]
        trace: PathBuf,

        #[arg(long)]
        audio: PathBuf,

        /// MIME type of the audio file
        #[arg(long, default_value = "audio/webm")]
        mime: String,

        /// Audio length, defaults to the trace duration
        #[arg(long)]
        duration_ms: Option<i64>,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Split a bundle into its trace and audio files
    Unbundle {
        content: PathBuf,

        /// Output directory
        #[arg(short = 'd', long, default_value = ".")]
        dir: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "rewind=info",
        1 => "rewind=debug",
        _ => "rewind=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_target(false)
        .init();

    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { trace } => {
            print!("{}", commands::inspect(&trace)?);
        }
        Commands::Validate { traces } => {
            commands::validate(&traces)?;
        }
        Commands::Verify { trace } => {
            let report = commands::verify(&trace, &config)?;
            println!(
                "ok: {} checkpoints rebuilt, {} sampled, {} in other sessions",
                report.rebuilt, report.sampled, report.skipped
            );
        }
        Commands::Bundle {
            trace,
            audio,
            mime,
            duration_ms,
            output,
        } => {
            let args = BundleArgs {
                trace,
                audio,
                mime_type: mime,
                duration_ms,
                output,
            };
            commands::bundle(&args, &config)?;
        }
        Commands::Unbundle { content, dir } => {
            let (trace, audio) = commands::unbundle(&content, &dir)?;
            println!("{}\n{}", trace.display(), audio.display());
        }
        Commands::Config => {
            print!("{}", config::to_toml(&config)?);
        }
    }

    Ok(())
}
