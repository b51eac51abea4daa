//! Job identifiers and the correlator that mints them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque correlation token for one backtest invocation
///
/// Rendered as 32 lowercase hex digits. Used as the partition key for the
/// log channel (`"l" + id`) and the cache entries (`id + "size"`, `id + "result"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(Uuid);

impl JobId {
    /// Mint a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier from its hex (or hyphenated) form
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::try_parse(s.trim()).map(Self)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for JobId {
    type Error = uuid::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.to_string()
    }
}

/// Hands out job identifiers for one session
///
/// Only the most recent id is current; minting a new one implicitly
/// invalidates the previous id for log attribution.
#[derive(Debug)]
pub struct JobCorrelator {
    current: JobId,
}

impl JobCorrelator {
    pub fn new() -> Self {
        Self {
            current: JobId::new(),
        }
    }

    /// The identifier currently in use
    pub fn current(&self) -> JobId {
        self.current
    }

    /// Mint a fresh identifier, returning the one it supersedes
    pub fn rotate(&mut self) -> JobId {
        std::mem::replace(&mut self.current, JobId::new())
    }
}

impl Default for JobCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_job_id_renders_as_simple_hex() {
        let id = JobId::new();
        let text = id.to_string();
        assert_eq!(text.len(), 32);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_job_id_parse_roundtrip() {
        let id = JobId::new();
        let parsed = JobId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_job_id_parse_rejects_garbage() {
        assert!(JobId::parse("not-a-job").is_err());
        assert!(JobId::parse("").is_err());
    }

    #[test]
    fn test_job_ids_are_unique() {
        let ids: HashSet<JobId> = (0..1000).map(|_| JobId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_correlator_rotate_returns_previous() {
        let mut correlator = JobCorrelator::new();
        let first = correlator.current();
        let superseded = correlator.rotate();
        assert_eq!(first, superseded);
        assert_ne!(correlator.current(), first);
    }

    #[test]
    fn test_job_id_serde_as_string() {
        let id = JobId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
