//! Diagnostic logging setup.
//!
//! Console output of runs is never logged here; this is for operator
//! diagnostics only, filtered with `RUST_LOG` (default `warn`).

use anyhow::{anyhow, Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub enum LogTarget {
    /// Headless modes log next to their own output.
    Stderr,
    /// The TUI owns the terminal, so logs go to a file in the cache dir.
    File,
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

pub fn log_file_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("jvm-scratch").join("jvm-scratch.log"))
}

pub fn init(target: LogTarget) -> Result<()> {
    match target {
        LogTarget::Stderr => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init()
            .map_err(|e| anyhow!(e)),
        LogTarget::File => {
            let path = log_file_path().context("no cache directory for the log file")?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow!(e))
        }
    }
}
