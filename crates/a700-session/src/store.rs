//! Persisted authentication session.

use std::path::{Path, PathBuf};

use a700_client::Credentials;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fs::{remove_if_exists, write_atomic};

/// File name under the data directory.
pub const SESSION_FILE: &str = "session.json";

/// What survives between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Refresh cookies from login, `name=value`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cookies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl SessionData {
    pub fn from_credentials(credentials: Credentials) -> Self {
        Self {
            access_token: Some(credentials.access_token),
            cookies: credentials.cookies,
            ..Default::default()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Take every field that `other` sets.
    pub fn merge(&mut self, other: SessionData) {
        if other.access_token.is_some() {
            self.access_token = other.access_token;
        }
        if !other.cookies.is_empty() {
            self.cookies = other.cookies;
        }
        if other.agent_uuid.is_some() {
            self.agent_uuid = other.agent_uuid;
        }
    }
}

/// JSON key-value blob holding the current session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self::at(data_dir.join(SESSION_FILE))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored session, or an empty one when nothing is saved.
    pub fn load(&self) -> Result<SessionData> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionData::default());
            }
            Err(e) => return Err(Error::io("failed to read", &self.path, e)),
        };
        serde_json::from_slice(&data).map_err(|source| Error::Corrupt {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Like [`load`](Self::load), but a corrupt file reads as empty.
    pub fn load_or_default(&self) -> SessionData {
        self.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not load session, ignoring it");
            SessionData::default()
        })
    }

    /// Replace the stored session. Only the owner can read the file.
    pub fn save(&self, data: &SessionData) -> Result<()> {
        let mut data = data.clone();
        data.saved_at = Some(Utc::now());
        let json = serde_json::to_vec_pretty(&data)?;
        write_atomic(&self.path, &json, true)?;
        tracing::debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    /// Merge `patch` into the stored session and save.
    pub fn update(&self, patch: SessionData) -> Result<SessionData> {
        let mut data = self.load_or_default();
        data.merge(patch);
        self.save(&data)?;
        self.load()
    }

    pub fn clear(&self) -> Result<()> {
        remove_if_exists(&self.path)
    }
}
