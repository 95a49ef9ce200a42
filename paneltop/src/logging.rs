//! tracing setup. The TUI owns the terminal, so logs go to a file:
//! $XDG_CONFIG_HOME/paneltop/paneltop.log, filtered by `PANELTOP_LOG` (default `info`).

use std::{fs, path::PathBuf, sync::Mutex};

use tracing_subscriber::EnvFilter;

use crate::profiles::config_dir;

pub const LOG_ENV: &str = "PANELTOP_LOG";

pub fn log_path() -> PathBuf {
    config_dir().join("paneltop.log")
}

/// Install the global subscriber. Returns the log file path on success.
pub fn init() -> anyhow::Result<PathBuf> {
    let path = log_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))?;
    Ok(path)
}
