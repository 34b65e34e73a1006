//! Persisted session credential.
//!
//! The bearer token lives in a small JSON file written by whatever logged the
//! operator in. It is re-read on every attempt so a fresh login is picked up
//! by the next retry without restarting the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Maximum accepted session file size (64 KiB)
const MAX_SESSION_FILE_SIZE: u64 = 64 * 1024;

/// Session file errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed session file
    #[error("invalid session file: {0}")]
    InvalidFormat(String),

    /// Session file exceeds the size limit
    #[error("session file too large: {0} bytes")]
    TooLarge(u64),
}

/// On-disk session contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer credential sent with report requests
    pub token: String,
    /// Optional expiry reported by the login flow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Load a session from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let size = std::fs::metadata(path)?.len();
        if size > MAX_SESSION_FILE_SIZE {
            return Err(SessionError::TooLarge(size));
        }
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| SessionError::InvalidFormat(e.to_string()))
    }

    /// Whether the recorded expiry lies in the past.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// Source of the bearer credential, read at request time.
pub trait TokenSource: Send + Sync {
    /// Current token, if any.
    fn bearer_token(&self) -> Option<String>;
}

/// [`TokenSource`] backed by a session file on disk.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Create a store reading from `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `$HOME/.report-downloader/session.json`.
    pub fn default_path() -> PathBuf {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".report-downloader")
            .join("session.json")
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenSource for SessionStore {
    fn bearer_token(&self) -> Option<String> {
        match Session::load(&self.path) {
            Ok(session) => {
                if session.is_expired(Utc::now()) {
                    warn!(path = ?self.path, "Session appears expired, sending token anyway");
                }
                if session.token.is_empty() {
                    return None;
                }
                Some(session.token)
            }
            Err(SessionError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "No session file, requesting without credential");
                None
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Could not read session file");
                None
            }
        }
    }
}

/// Fixed token, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl TokenSource for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}
