//! Run log streaming
//!
//! While a backtest runs, every `tracing` event inside its job span is
//! turned into a [`LogRecord`] and handed to the sinks attached for that
//! job: the job's broker channel (picked up by the listener) and a
//! numbered log file.

mod layer;
mod record;
mod sink;

pub use layer::{JobLogLayer, SinkGuard, SinkRegistry, JOB_FIELD};
pub use record::{LogLevel, LogRecord};
pub use sink::{ChannelSink, FileSink, LogFileNamer, LogSink};
