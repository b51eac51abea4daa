//! Listener wire types

use crate::job::JobId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Listener errors
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Accept failed: {0}")]
    Accept(#[from] std::io::Error),
    #[error("Handshake failed: {0}")]
    Handshake(String),
    #[error("Malformed connect message {0:?}")]
    BadConnect(String),
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error(transparent)]
    Broker(#[from] crate::broker::BrokerError),
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Chart viewport reported by the browser, cached as `"w,h"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartSize {
    pub width: u32,
    pub height: u32,
}

impl ChartSize {
    pub fn parse(s: &str) -> Option<Self> {
        let (w, h) = s.split_once(',')?;
        Some(Self {
            width: w.trim().parse().ok()?,
            height: h.trim().parse().ok()?,
        })
    }
}

impl fmt::Display for ChartSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.width, self.height)
    }
}

/// First message from the browser: `"{jobid};{width},{height}"`
///
/// Accepted as raw text or wrapped as `{"data": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub job: JobId,
    pub size: ChartSize,
    /// The connect text as sent, echoed in the acknowledgement
    pub text: String,
}

#[derive(Deserialize)]
struct Wrapped {
    data: String,
}

impl ConnectRequest {
    pub fn parse(message: &str) -> Result<Self, ListenerError> {
        let text = match serde_json::from_str::<Wrapped>(message) {
            Ok(wrapped) => wrapped.data,
            Err(_) => message.trim().to_string(),
        };
        let bad = || ListenerError::BadConnect(message.to_string());
        let (job, size) = text.split_once(';').ok_or_else(bad)?;
        let job = JobId::parse(job).map_err(|_| bad())?;
        let size = ChartSize::parse(size).ok_or_else(bad)?;
        Ok(Self { job, size, text })
    }
}

/// Event pushed to the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub data: String,
    pub count: u64,
}

impl LogEvent {
    pub fn new(data: impl Into<String>, count: u64) -> Self {
        Self {
            data: data.into(),
            count,
        }
    }
}
