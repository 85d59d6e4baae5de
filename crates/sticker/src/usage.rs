//! Append-only usage log.
//!
//! Each successful export appends one line of the form
//!
//! ```text
//! [2026-10-16T09:30:00Z] Action: download | Details: {"thickness":15}
//! ```
//!
//! and answers with a [`Receipt`] carrying the running total of entries.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Errors while recording usage.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    /// The log file (or its directory) could not be written.
    #[error("failed to write usage log {path}: {source}")]
    Write {
        /// Log file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The details could not be serialized.
    #[error("failed to serialize usage details: {0}")]
    Details(#[from] serde_json::Error),
}

/// Outcome reported back after recording an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Receipt {
    /// The entry was appended.
    Success {
        /// Number of non-empty lines in the log after appending.
        #[serde(rename = "totalUses")]
        total_uses: usize,
        /// Human-readable confirmation.
        message: String,
    },
    /// The entry could not be appended.
    Error {
        /// Human-readable failure.
        message: String,
    },
}

/// A usage log backed by a plain text file.
#[derive(Debug, Clone)]
pub struct UsageLog {
    path: PathBuf,
}

impl UsageLog {
    /// Use the file at `path`. Nothing is touched until the first
    /// [`record`](Self::record).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and return the new total.
    ///
    /// Missing parent directories are created. `details` of `None` is
    /// written as `{}`.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::Write`] if the entry cannot be appended.
    pub fn append(
        &self,
        action: &str,
        details: Option<&Value>,
        now: DateTime<Utc>,
    ) -> Result<usize, UsageError> {
        let details = match details {
            Some(value) => serde_json::to_string(value)?,
            None => "{}".to_owned(),
        };
        let line = format!(
            "[{}] Action: {action} | Details: {details}\n",
            now.format("%Y-%m-%dT%H:%M:%SZ")
        );

        let write_err = |source| UsageError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir).map_err(write_err)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(write_err)?;

        Ok(self.total_uses())
    }

    /// Number of non-empty lines in the log; zero if it cannot be read.
    #[must_use]
    pub fn total_uses(&self) -> usize {
        std::fs::read_to_string(&self.path).map_or(0, |text| {
            text.lines().filter(|line| !line.trim().is_empty()).count()
        })
    }

    /// Append one entry and describe the outcome as a [`Receipt`].
    pub fn record(&self, action: &str, details: Option<&Value>, now: DateTime<Utc>) -> Receipt {
        match self.append(action, details, now) {
            Ok(total_uses) => Receipt::Success {
                total_uses,
                message: format!("Logged successfully. Total uses: {total_uses}"),
            },
            Err(e) => {
                log::error!("{e}");
                Receipt::Error {
                    message: "Failed to write log".to_owned(),
                }
            }
        }
    }
}
