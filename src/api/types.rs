use crate::session::UserProfile;
use serde::{Deserialize, Serialize};

/// Raw body of `GET /whatsapp/instance/status`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub profile_name: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub instance_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateInstanceRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<&'a str>,
}

/// Body of `POST /whatsapp/instance/create`. When the instance is already
/// linked the backend answers `connected: true` and no QR.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreateInstanceResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub qrcode: Option<String>,
    #[serde(default)]
    pub instance_name: Option<String>,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QrCodeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub qrcode: Option<String>,
    /// Raw pairing string encoded in the QR image.
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub healthy: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserProfile,
}

/// Error body. FastAPI sends a string for `HTTPException` and a list of
/// objects for validation errors.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub(crate) fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            serde_json::Value::Array(items) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(serde_json::Value::as_str))
                    .collect();
                if msgs.is_empty() {
                    None
                } else {
                    Some(msgs.join("; "))
                }
            }
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}
