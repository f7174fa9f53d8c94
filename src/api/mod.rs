pub mod client;
pub mod types;

pub use client::HttpApiClient;
pub use types::{
    CreateInstanceResponse, HealthResponse, LoginResponse, QrCodeResponse, StatusPayload,
    TokenResponse,
};

use crate::errors::PairingResult;
use async_trait::async_trait;

/// WhatsApp instance endpoints of the backend.
///
/// The pairing flow only talks to this trait, so it can be driven by the HTTP
/// client or by a scripted mock in tests.
#[async_trait]
pub trait InstanceApi: Send + Sync {
    async fn status(&self) -> PairingResult<StatusPayload>;

    async fn create_instance(
        &self,
        instance_name: Option<&str>,
    ) -> PairingResult<CreateInstanceResponse>;

    async fn qrcode(&self) -> PairingResult<QrCodeResponse>;

    async fn disconnect(&self) -> PairingResult<()>;

    async fn token(&self) -> PairingResult<TokenResponse>;

    async fn health(&self) -> PairingResult<HealthResponse>;
}
