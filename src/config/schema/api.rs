use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Backend REST API settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url", rename = "baseUrl")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs", rename = "timeoutSecs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs", rename = "connectTimeoutSecs")]
    pub connect_timeout_secs: u64,
    /// Bearer token override. Normally empty; the token comes from the session file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    /// Pins the agency scope regardless of the stored selection.
    #[serde(default, rename = "agencyId", skip_serializing_if = "Option::is_none")]
    pub agency_id: Option<String>,
}

redact_debug!(
    ApiConfig,
    base_url,
    timeout_secs,
    connect_timeout_secs,
    redact(token),
    agency_id,
);

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            token: String::new(),
            agency_id: None,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
