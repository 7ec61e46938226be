//! Persisted credential state.
//!
//! A session blob is a JSON file holding the cookies of a logged-in browsing
//! context plus the time it was captured. It is produced out of band by the
//! interactive `login` flow and restored into every new session at creation
//! time. Its absence is a valid state unless the configuration says
//! otherwise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors from loading or saving a session blob.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read session file: {0}")]
    Read(#[from] std::io::Error),
    #[error("session file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One persisted cookie. Only the fields needed to restore the cookie into
/// a fresh context are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    /// Unix expiry timestamp; session cookies omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
}

/// The on-disk credential blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub cookies: Vec<StoredCookie>,
    pub saved_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(cookies: Vec<StoredCookie>) -> Self {
        Self {
            cookies,
            saved_at: Utc::now(),
        }
    }

    /// Load a session blob from disk.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Load a session blob if the file exists; `None` otherwise.
    pub fn load_if_present(path: &Path) -> Result<Option<Self>, SessionError> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Write the blob to disk as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Default location of the session blob: `~/.gramlens/session.json`.
pub fn default_session_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".gramlens/session.json")
}
