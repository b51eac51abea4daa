//! Message broker module
//!
//! Key-value cache and publish/subscribe channels shared between the
//! backtest runner, the log listener and the console. Everything is
//! partitioned by job id.

mod memory;

pub use memory::InMemoryBroker;

use crate::job::JobId;
use thiserror::Error;
use tokio::sync::broadcast;

/// Broker errors
#[derive(Debug, Error)]
pub enum BrokerError {
    /// An internal lock was poisoned by a panicking holder
    #[error("Broker state poisoned: {0}")]
    Poisoned(&'static str),
}

/// Key-value store with pub/sub channels
///
/// Methods are synchronous so they can be called from the logging layer,
/// which runs inside arbitrary (possibly blocking) threads.
pub trait MessageBroker: Send + Sync {
    /// `SET key value`
    fn set(&self, key: &str, value: &str) -> Result<(), BrokerError>;
    /// `GET key`
    fn get(&self, key: &str) -> Result<Option<String>, BrokerError>;
    /// `DEL key`, returns whether the key existed
    fn del(&self, key: &str) -> Result<bool, BrokerError>;
    /// `PUBLISH channel payload`, returns the number of receiving subscribers
    fn publish(&self, channel: &str, payload: &str) -> Result<usize, BrokerError>;
    /// `SUBSCRIBE channel`; only messages published afterwards are delivered
    fn subscribe(&self, channel: &str) -> Result<Subscription, BrokerError>;
}

/// Channel carrying a job's log records
pub fn log_channel(job: &JobId) -> String {
    format!("l{}", job)
}

/// Cache key holding the requested chart size (`"w,h"`)
pub fn size_key(job: &JobId) -> String {
    format!("{}size", job)
}

/// Cache key holding the serialized result bundle
pub fn result_key(job: &JobId) -> String {
    format!("{}result", job)
}

/// Live subscription to one channel
pub struct Subscription {
    channel: String,
    rx: broadcast::Receiver<String>,
}

impl Subscription {
    pub(crate) fn new(channel: String, rx: broadcast::Receiver<String>) -> Self {
        Self { channel, rx }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next message; `None` once the channel is gone
    ///
    /// Messages a slow subscriber fell behind on are skipped.
    pub async fn next(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = %self.channel, skipped, "Subscriber lagged, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take a message if one is already queued
    pub fn try_next(&mut self) -> Option<String> {
        loop {
            match self.rx.try_recv() {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
