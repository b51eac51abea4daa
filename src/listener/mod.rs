//! Log listener
//!
//! WebSocket server the browser connects to for a job's live log. The
//! client announces `"{jobid};{width},{height}"`, the listener caches the
//! chart size, subscribes to the job's log channel and pushes each record
//! as `{data, count}`.

mod protocol;
mod server;

pub use protocol::{ChartSize, ConnectRequest, ListenerError, LogEvent};
pub use server::LogListener;
