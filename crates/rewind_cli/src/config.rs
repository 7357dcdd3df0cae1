//! Rewind configuration file handling

use anyhow::{Context, Result};
use rewind_core::RewindConfig;
use std::fs;
use std::path::Path;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "rewind.toml";

/// Load configuration.
///
/// An explicit path must exist. Without one, `rewind.toml` is used when
/// present and the defaults otherwise.
pub fn load(explicit: Option<&Path>) -> Result<RewindConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file {} does not exist", path.display());
            }
            path
        }
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if !fallback.exists() {
                tracing::debug!("no {DEFAULT_CONFIG_FILE}, using defaults");
                return Ok(RewindConfig::default());
            }
            fallback
        }
    };
    load_file(path)
}

fn load_file(path: &Path) -> Result<RewindConfig> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let config: RewindConfig =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;

    config
        .recorder
        .validate()
        .map_err(|reason| anyhow::anyhow!("Invalid [recorder] section in {}: {reason}", path.display()))?;
    tracing::debug!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Serialize to a TOML string
pub fn to_toml(config: &RewindConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize config")
}
