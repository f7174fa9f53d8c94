use super::{AgencyScope, SessionContext, UserProfile};
use crate::utils::{get_sdrlink_home, write_private};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    token: String,
    #[serde(default)]
    user: Option<UserProfile>,
    #[serde(default, rename = "selectedAgency")]
    scope: Option<AgencyScope>,
    #[serde(rename = "savedAt")]
    saved_at: DateTime<Utc>,
}

/// Persists the session between CLI invocations (`session.json`, mode 0600).
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new() -> Result<Self> {
        Ok(Self {
            path: get_sdrlink_home()?.join("session.json"),
        })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Load the stored session. A corrupt file is treated as logged out.
    pub fn load(&self) -> Result<Option<SessionContext>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session from {}", self.path.display()))?;
        match serde_json::from_str::<StoredSession>(&content) {
            Ok(stored) if !stored.token.is_empty() => {
                debug!("loaded session saved at {}", stored.saved_at);
                Ok(Some(SessionContext::from_parts(
                    stored.token,
                    stored.user,
                    stored.scope,
                )))
            }
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("ignoring unreadable session file {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    pub fn save(&self, session: &SessionContext) -> Result<()> {
        let stored = StoredSession {
            token: session.token().to_string(),
            user: session.user().cloned(),
            scope: session.scope().cloned(),
            saved_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&stored)?;
        write_private(&self.path, &content)
            .with_context(|| format!("Failed to write session to {}", self.path.display()))
    }

    /// Remove the stored session. Returns whether a session existed.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove session {}", self.path.display())),
        }
    }
}
