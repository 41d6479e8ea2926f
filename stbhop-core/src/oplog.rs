//! Append-only operation log
//!
//! One JSON object per line in `operations.jsonl`. The log is diagnostic
//! only: write failures are logged and never fail the operation.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult, HopError};

/// How an operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Completed
    Success,
    /// Failed with an error
    Failure,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// One logged operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// When the operation finished
    pub timestamp: DateTime<Utc>,
    /// Proxy host
    pub host: String,
    /// Device address, if the operation targeted one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Catalog key or command text
    pub command: String,
    /// Result
    pub outcome: Outcome,
    /// Error message for failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationRecord {
    /// Record for a completed operation
    #[must_use]
    pub fn success(host: &str, device: Option<&str>, command: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            host: host.to_string(),
            device: device.map(ToString::to_string),
            command: command.to_string(),
            outcome: Outcome::Success,
            error: None,
        }
    }

    /// Record for a failed operation
    #[must_use]
    pub fn failure(host: &str, device: Option<&str>, command: &str, error: &HopError) -> Self {
        Self {
            outcome: Outcome::Failure,
            error: Some(error.to_string()),
            ..Self::success(host, device, command)
        }
    }
}

/// The operation log file
#[derive(Debug, Clone)]
pub struct OperationLog {
    path: PathBuf,
}

impl OperationLog {
    /// Log stored at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the log file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `record`, logging instead of failing
    pub fn append(&self, record: &OperationRecord) {
        if let Err(e) = self.try_append(record) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to write operation log");
        }
    }

    fn try_append(&self, record: &OperationRecord) -> ConfigResult<()> {
        let io_error = |source| ConfigError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let mut line =
            serde_json::to_string(record).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_error)?;
        file.write_all(line.as_bytes()).map_err(io_error)
    }

    /// The last `limit` records, oldest first
    ///
    /// Unparseable lines are skipped; a missing file is an empty log.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file exists but cannot be read.
    pub fn recent(&self, limit: usize) -> ConfigResult<Vec<OperationRecord>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let records: Vec<OperationRecord> = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed operation log line");
                    None
                }
            })
            .collect();
        let skip = records.len().saturating_sub(limit);
        Ok(records.into_iter().skip(skip).collect())
    }
}
