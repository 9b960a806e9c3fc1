//! File listeners and diagnostic tracing setup
//!
//! Opens timestamped log files that can be registered as listeners, and
//! installs the `tracing` subscriber used for the crate's own diagnostics.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Local;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Prefix shared by every log file this crate creates
pub const LOG_FILE_PREFIX: &str = "botlog-";

/// Local start time embedded in every log file name
pub const LOG_FILE_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Information about an opened log file
#[derive(Debug, Clone)]
pub struct LogFileInfo {
    /// Full path to the log file
    pub path: PathBuf,
}

/// A file shared with the logger as a listener
pub type FileListener = Arc<Mutex<File>>;

/// Generate a timestamped log file path
pub fn create_log_file_path(logs_dir: &Path) -> PathBuf {
    let timestamp = Local::now().format(LOG_FILE_TIME_FORMAT);
    logs_dir.join(format!("{}{}.log", LOG_FILE_PREFIX, timestamp))
}

/// Open a new timestamped log file in `logs_dir`
///
/// The caller owns the returned listener; the logger only holds it weakly, so
/// dropping it detaches the file at the next flush.
pub fn open_log_file(logs_dir: &Path) -> Result<(LogFileInfo, FileListener)> {
    fs::create_dir_all(logs_dir).context("Failed to create logs directory")?;

    let path = create_log_file_path(logs_dir);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .context("Failed to open log file")?;

    Ok((LogFileInfo { path }, Arc::new(Mutex::new(file))))
}

/// Install the stderr `tracing` subscriber for internal diagnostics
///
/// `RUST_LOG` overrides `default_filter` when set.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to install tracing subscriber")
}
