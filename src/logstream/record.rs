//! Log record wire format

use crate::job::JobId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Level names as shown in the browser's level filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => LogLevel::Error,
            tracing::Level::WARN => LogLevel::Warning,
            tracing::Level::INFO => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One log record emitted during a run
///
/// Serialized as `{"levelname": .., "msg": .., "name": ..}` on the job's
/// log channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(rename = "levelname")]
    pub level: LogLevel,
    #[serde(rename = "msg")]
    pub message: String,
    #[serde(rename = "name")]
    pub source: String,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            source: source.into(),
        }
    }

    /// Encode for publishing
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a channel payload, `None` when malformed
    pub fn from_payload(payload: &str) -> Option<Self> {
        serde_json::from_str(payload).ok()
    }

    /// String forwarded to the browser: `{job}{source}: {LEVEL}: {message}`
    ///
    /// The job id prefix lets the page ignore lines from a stale job.
    pub fn display(&self, job: &JobId) -> String {
        format!("{}{}: {}: {}", job, self.source, self.level, self.message)
    }

    /// Line written to the run's log file
    pub fn file_line(&self) -> String {
        format!("{} - {}", self.level, self.message)
    }
}
