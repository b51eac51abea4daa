//! Flat credentials file
//!
//! A JSON object `username -> password`, read wholesale and rewritten
//! wholesale on every change. There is no locking: concurrent writers from
//! separate processes can lose updates.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// User store errors
#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to encode users: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Username must not be empty")]
    EmptyUsername,
}

/// Credentials kept in a JSON file
#[derive(Debug, Clone)]
pub struct UserStore {
    path: PathBuf,
}

impl UserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All users; a missing or unreadable file reads as empty
    pub fn users(&self) -> BTreeMap<String, String> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "No users file");
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "Ignoring invalid users file");
            BTreeMap::new()
        })
    }

    /// `[username, password]` pairs, sorted by username
    pub fn list(&self) -> Vec<(String, String)> {
        self.users().into_iter().collect()
    }

    /// Add or replace a user
    pub fn add(&self, username: &str, password: &str) -> Result<(), UserStoreError> {
        if username.is_empty() {
            return Err(UserStoreError::EmptyUsername);
        }
        let mut users = self.users();
        users.insert(username.to_string(), password.to_string());
        let content = serde_json::to_string_pretty(&users)?;
        std::fs::write(&self.path, content).map_err(|source| UserStoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!(username, "User saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::new(dir.path().join("users.json"));
        assert!(store.users().is_empty());
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_invalid_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(UserStore::new(&path).users().is_empty());
    }

    #[test]
    fn test_add_and_replace() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::new(dir.path().join("users.json"));
        store.add("bob", "secret").unwrap();
        store.add("alice", "pw").unwrap();
        store.add("bob", "changed").unwrap();

        assert_eq!(
            store.list(),
            vec![
                ("alice".to_string(), "pw".to_string()),
                ("bob".to_string(), "changed".to_string())
            ]
        );
        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("\n  \"alice\": \"pw\""));
    }

    #[test]
    fn test_empty_username_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::new(dir.path().join("users.json"));
        assert!(matches!(store.add("", "x"), Err(UserStoreError::EmptyUsername)));
    }

    #[test]
    fn test_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::new(dir.path().join("missing").join("users.json"));
        assert!(matches!(store.add("bob", "x"), Err(UserStoreError::Write { .. })));
    }
}
