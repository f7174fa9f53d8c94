use crate::api::{InstanceApi, StatusPayload};
use crate::errors::PairingResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    NotConfigured,
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "not configured"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Normalized view of the backend's status payload.
///
/// Display metadata (`phone_number`, `profile_name`, `profile_picture_url`)
/// is only kept when the instance is connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub phone_number: Option<String>,
    pub profile_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub instance_name: Option<String>,
}

impl ConnectionStatus {
    pub fn not_configured() -> Self {
        Self {
            state: ConnectionState::NotConfigured,
            phone_number: None,
            profile_name: None,
            profile_picture_url: None,
            instance_name: None,
        }
    }

    pub fn from_payload(payload: StatusPayload) -> Self {
        let state = normalize_state(payload.connected, payload.status.as_deref());
        let connected = state == ConnectionState::Connected;
        let keep = |v: Option<String>| v.filter(|s| connected && !s.trim().is_empty());
        Self {
            state,
            phone_number: keep(payload.phone_number),
            profile_name: keep(payload.profile_name),
            profile_picture_url: keep(payload.profile_picture),
            instance_name: payload.instance_name.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Phone number as shown to the operator (`+5511999999999`).
    pub fn display_phone(&self) -> Option<String> {
        self.phone_number.as_deref().and_then(format_phone)
    }
}

/// Map the backend's `connected` flag and free-form `status` string onto
/// [`ConnectionState`]. The flag wins when set.
pub fn normalize_state(connected: bool, status: Option<&str>) -> ConnectionState {
    if connected {
        return ConnectionState::Connected;
    }
    let Some(raw) = status else {
        return ConnectionState::Disconnected;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "open" | "connected" => ConnectionState::Connected,
        "not_configured" | "not_found" => ConnectionState::NotConfigured,
        "connecting" | "waiting_scan" => ConnectionState::Connecting,
        _ => ConnectionState::Disconnected,
    }
}

/// Format a raw phone or JID (`5511999999999@s.whatsapp.net`) as `+digits`.
pub fn format_phone(raw: &str) -> Option<String> {
    let local = raw.split('@').next().unwrap_or_default();
    let digits: String = local.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        None
    } else {
        Some(format!("+{}", digits))
    }
}

/// Queries the status endpoint and normalizes the answer.
pub struct StatusProber {
    api: Arc<dyn InstanceApi>,
}

impl StatusProber {
    pub fn new(api: Arc<dyn InstanceApi>) -> Self {
        Self { api }
    }

    pub async fn probe(&self) -> PairingResult<ConnectionStatus> {
        let payload = self.api.status().await?;
        let status = ConnectionStatus::from_payload(payload);
        debug!("probed instance status: {}", status.state);
        Ok(status)
    }
}
