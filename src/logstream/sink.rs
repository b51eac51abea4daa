//! Destinations for a run's log records

use super::LogRecord;
use crate::broker::{log_channel, MessageBroker};
use crate::job::JobId;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Receives log records for one job
pub trait LogSink: Send + Sync {
    fn write(&self, record: &LogRecord);
}

/// Publishes records on the job's log channel
pub struct ChannelSink {
    broker: Arc<dyn MessageBroker>,
    channel: String,
}

impl ChannelSink {
    pub fn for_job(broker: Arc<dyn MessageBroker>, job: &JobId) -> Self {
        Self {
            broker,
            channel: log_channel(job),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl LogSink for ChannelSink {
    fn write(&self, record: &LogRecord) {
        let payload = match record.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode log record");
                return;
            }
        };

        if let Err(e) = self.broker.publish(&self.channel, &payload) {
            tracing::warn!(error = %e, channel = %self.channel, "Failed to publish log record");
        }
    }
}

/// Appends `LEVEL - message` lines to a per-run log file
pub struct FileSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileSink {
    fn write(&self, record: &LogRecord) {
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        let written = writeln!(writer, "{}", record.file_line()).and_then(|_| writer.flush());
        if let Err(e) = written {
            tracing::warn!(error = %e, path = ?self.path, "Failed to write log file");
        }
    }
}

/// Hands out sequentially numbered `backtestNNN-logs.txt` paths
///
/// The counter starts after the highest number already present in the
/// directory when the namer is constructed. Not coordinated across
/// processes sharing the directory.
#[derive(Debug)]
pub struct LogFileNamer {
    dir: PathBuf,
    counter: AtomicU32,
}

impl LogFileNamer {
    /// Scan `dir` (creating it if needed) for existing run logs
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut highest = 0;
        for entry in std::fs::read_dir(&dir)? {
            let name = entry?.file_name();
            if let Some(n) = name.to_str().and_then(Self::parse_number) {
                highest = highest.max(n);
            }
        }

        tracing::debug!(dir = ?dir, highest, "Scanned backtest log directory");

        Ok(Self {
            dir,
            counter: AtomicU32::new(highest),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for the next run
    pub fn next_file_name(&self) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.dir.join(format!("backtest{:03}-logs.txt", n))
    }

    fn parse_number(name: &str) -> Option<u32> {
        let rest = name.strip_prefix("backtest")?;
        if !name.ends_with(".txt") {
            return None;
        }
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }
}
