//! Job correlation and lifecycle
//!
//! Every backtest invocation is tagged with a [`JobId`]; log records and
//! cache entries for that run are keyed by it.

mod id;
mod state;

pub use id::{JobCorrelator, JobId};
pub use state::{Job, JobError, JobParams, JobStatus};
