//! Crash-safe run log
//!
//! One event per line, each line synced to storage before `write_line`
//! returns. There is no buffering, so a crash right after a line is written
//! never loses it.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Fixed event tags in the run log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    Info,
    Ok,
    Warn,
    Err,
    Fatal,
}

impl LogTag {
    /// Line prefix, padded so target columns line up
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Info => "[INFO] ",
            Self::Ok => "[OK]  ",
            Self::Warn => "[WARN] ",
            Self::Err => "[ERR] ",
            Self::Fatal => "[FATAL] ",
        }
    }
}

impl fmt::Display for LogTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end())
    }
}

/// Append-only run log shared by every worker of a run
///
/// Writes are serialized through an internal mutex so lines from concurrent
/// targets never interleave.
#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl RunLog {
    /// Opens the log, truncating anything left by a previous run
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(Some(file)),
        })
    }

    /// Appends `line` and a newline, then syncs before returning
    ///
    /// Lines written after `close` are dropped.
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(file) = guard.as_mut() else {
            return Ok(());
        };

        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');

        file.write_all(record.as_bytes())?;
        file.sync_data()
    }

    /// Writes a tagged event and mirrors it to the console
    pub fn event(&self, tag: LogTag, message: &str) {
        match tag {
            LogTag::Info | LogTag::Ok => tracing::info!("{}", message),
            LogTag::Warn => tracing::warn!("{}", message),
            LogTag::Err | LogTag::Fatal => tracing::error!("{}", message),
        }

        self.record(&format!("{}{}", tag.prefix(), message));
    }

    /// Writes an untagged banner line and mirrors it to the console
    pub fn banner(&self, message: &str) {
        tracing::info!("{}", message);
        self.record(&format!("=== {} ===", message));
    }

    fn record(&self, line: &str) {
        if let Err(e) = self.write_line(line) {
            tracing::warn!("Failed to write {}: {}", self.path.display(), e);
        }
    }

    /// Syncs and releases the file; safe to call more than once
    pub fn close(&self) {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = guard.take() {
            if let Err(e) = file.sync_all() {
                tracing::warn!("Failed to sync {}: {}", self.path.display(), e);
            }
        }
    }
}
