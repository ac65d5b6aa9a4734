//! Logging setup for retfix
//!
//! Diagnostics go to stderr so stdout carries only the confirmation line
//! and previews. When debug logging is enabled in the config, the same
//! events are appended to ~/.retfix/retfix.log.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, registry};

/// Filter used when RUST_LOG is not set
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose { "retfix=debug" } else { "retfix=warn" }
}

/// Initialize the logging system
///
/// Returns the path of the log file when file logging was enabled.
pub fn init_logging(verbose: bool, debug_file: Option<&Path>) -> Result<Option<PathBuf>> {
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)))
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(filter());

    let (file_layer, log_path) = match debug_file {
        Some(path) => match open_log_file(path) {
            Ok(log_file) => {
                let layer = fmt::layer()
                    .with_writer(Mutex::new(log_file))
                    .with_ansi(false)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_filter(EnvFilter::new("retfix=debug"));
                (Some(layer), Some(path.to_path_buf()))
            }
            Err(e) => {
                // Logging problems must not stop the rewrite
                eprintln!("Warning: Could not create log file: {:#}", e);
                (None, None)
            }
        },
        None => (None, None),
    };

    registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    Ok(log_path)
}

fn open_log_file(log_path: &Path) -> Result<fs::File> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }

    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))
}

/// Default debug log location: ~/.retfix/retfix.log
pub fn default_log_path() -> Result<PathBuf> {
    Ok(crate::config::retfix_home()?.join("retfix.log"))
}
