//! Log file retention
//!
//! A file listener writes one logging session to `botlog-<local start>.log`.
//! Age is measured from that start time, not from the last write, so a
//! session expires as a whole. Files still held by a live listener are listed
//! in the policy and never removed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone};

use super::file_writer::{LOG_FILE_PREFIX, LOG_FILE_TIME_FORMAT};
use crate::config::Config;

/// Longest retention honoured; larger values are clamped
const MAX_RETENTION_DAYS: u64 = 36_500;

/// Which log files a cleanup may delete
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Sessions started longer ago than this are expired
    pub max_age: Duration,
    /// Files never deleted, such as the one a running listener writes to
    pub keep: Vec<PathBuf>,
}

impl RetentionPolicy {
    pub fn days(days: u64) -> Self {
        Self {
            max_age: Duration::days(days.min(MAX_RETENTION_DAYS) as i64),
            keep: Vec::new(),
        }
    }

    /// Policy from `retention_days` in the config
    pub fn from_config(config: &Config) -> Self {
        Self::days(config.retention_days)
    }

    /// Protect `path` from deletion
    pub fn keep(mut self, path: impl Into<PathBuf>) -> Self {
        self.keep.push(path.into());
        self
    }

    fn is_expired(&self, started: DateTime<Local>, now: DateTime<Local>) -> bool {
        now.signed_duration_since(started) > self.max_age
    }
}

/// Session start encoded in a log file name; `None` for files that are not ours
pub fn log_file_started(path: &Path) -> Option<DateTime<Local>> {
    let name = path.file_name()?.to_str()?;
    let stamp = name.strip_prefix(LOG_FILE_PREFIX)?.strip_suffix(".log")?;
    let naive = NaiveDateTime::parse_from_str(stamp, LOG_FILE_TIME_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}

/// Delete expired log files in `logs_dir`
///
/// Returns the removed paths, sorted. A file that cannot be removed is
/// skipped with a warning.
pub fn cleanup_old_logs(logs_dir: &Path, policy: &RetentionPolicy) -> Result<Vec<PathBuf>> {
    cleanup_old_logs_at(logs_dir, policy, Local::now())
}

fn cleanup_old_logs_at(
    logs_dir: &Path,
    policy: &RetentionPolicy,
    now: DateTime<Local>,
) -> Result<Vec<PathBuf>> {
    if !logs_dir.exists() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(logs_dir)
        .with_context(|| format!("Failed to read logs directory {}", logs_dir.display()))?;

    let mut removed = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if policy.keep.contains(&path) {
            continue;
        }
        let Some(started) = log_file_started(&path) else {
            continue;
        };
        if !policy.is_expired(started, now) {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Removed expired log file {}", path.display());
                removed.push(path);
            }
            Err(e) => tracing::warn!("Failed to remove log file {}: {}", path.display(), e),
        }
    }

    removed.sort();
    Ok(removed)
}
