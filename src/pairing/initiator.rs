use super::status::{ConnectionState, ConnectionStatus};
use crate::api::InstanceApi;
use crate::errors::{PairingError, PairingResult};
use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const QR_UNAVAILABLE: &str = "QR code generation is not available yet";
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// An outstanding QR pairing attempt. Lives only in memory while the
/// machine is connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingSession {
    /// Base64 PNG as sent by the backend, possibly a `data:` URL.
    pub qr_payload: String,
    /// Raw string encoded in the QR, when the backend exposes it.
    pub pairing_code: Option<String>,
    pub instance_name: Option<String>,
    pub created_at: Instant,
}

impl PairingSession {
    pub fn new(qr_payload: impl Into<String>) -> Self {
        Self {
            qr_payload: qr_payload.into(),
            pairing_code: None,
            instance_name: None,
            created_at: Instant::now(),
        }
    }

    /// Decode the QR image bytes.
    pub fn qr_png(&self) -> Result<Vec<u8>> {
        decode_qr_payload(&self.qr_payload)
    }
}

/// Decode a backend QR payload (bare base64 or a `data:` URL) to PNG bytes.
pub fn decode_qr_payload(payload: &str) -> Result<Vec<u8>> {
    let encoded = match payload.split_once(',') {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };
    let bytes = STANDARD
        .decode(encoded.trim())
        .context("QR payload is not valid base64")?;
    if !bytes.starts_with(PNG_SIGNATURE) {
        bail!("QR payload is not a PNG image");
    }
    Ok(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingOutcome {
    AwaitingScan(PairingSession),
    /// The backend reports the instance is already linked; no QR needed.
    AlreadyConnected(ConnectionStatus),
}

/// Asks the backend for QR codes.
pub struct PairingInitiator {
    api: Arc<dyn InstanceApi>,
    instance_name: Option<String>,
}

impl PairingInitiator {
    pub fn new(api: Arc<dyn InstanceApi>, instance_name: Option<String>) -> Self {
        Self { api, instance_name }
    }

    /// `POST /whatsapp/instance/create`.
    pub async fn initiate(&self) -> PairingResult<PairingOutcome> {
        let resp = self.api.create_instance(self.instance_name.as_deref()).await?;

        if resp.connected {
            info!("instance already connected, skipping QR");
            return Ok(PairingOutcome::AlreadyConnected(ConnectionStatus {
                state: ConnectionState::Connected,
                phone_number: resp.phone_number,
                profile_name: None,
                profile_picture_url: None,
                instance_name: resp.instance_name,
            }));
        }

        if !resp.success {
            return Err(PairingError::Unavailable(
                resp.message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "could not generate a QR code".into()),
            ));
        }

        let qr = non_empty(resp.qrcode)
            .ok_or_else(|| PairingError::Unavailable(QR_UNAVAILABLE.into()))?;
        debug!("pairing session created ({} byte QR)", qr.len());

        let mut session = PairingSession::new(qr);
        session.instance_name = resp.instance_name.or_else(|| self.instance_name.clone());
        Ok(PairingOutcome::AwaitingScan(session))
    }

    /// `GET /whatsapp/instance/qrcode`: a fresh QR for the existing instance.
    pub async fn regenerate(&self) -> PairingResult<PairingSession> {
        let resp = self.api.qrcode().await?;
        let qr = non_empty(resp.qrcode)
            .ok_or_else(|| PairingError::Unavailable(QR_UNAVAILABLE.into()))?;
        let mut session = PairingSession::new(qr);
        session.pairing_code = non_empty(resp.code);
        session.instance_name = self.instance_name.clone();
        Ok(session)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
