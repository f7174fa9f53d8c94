//! Scripted [`InstanceApi`] for unit tests.

use crate::api::{
    CreateInstanceResponse, HealthResponse, InstanceApi, QrCodeResponse, StatusPayload,
    TokenResponse,
};
use crate::errors::PairingResult;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type Scripted<T> = Mutex<VecDeque<(Duration, PairingResult<T>)>>;

/// Each endpoint pops its next scripted reply (optionally delayed); an empty
/// script falls back to a benign default.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    status: Scripted<StatusPayload>,
    create: Scripted<CreateInstanceResponse>,
    qrcode: Scripted<QrCodeResponse>,
    disconnect: Scripted<()>,
    pub status_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub qrcode_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
}

pub(crate) fn waiting() -> StatusPayload {
    StatusPayload {
        status: Some("connecting".into()),
        ..StatusPayload::default()
    }
}

pub(crate) fn connected(phone: &str) -> StatusPayload {
    StatusPayload {
        connected: true,
        status: Some("open".into()),
        phone_number: Some(phone.into()),
        profile_name: Some("Loja".into()),
        instance_name: Some("tenet-1".into()),
        ..StatusPayload::default()
    }
}

pub(crate) fn qr(code: &str) -> CreateInstanceResponse {
    CreateInstanceResponse {
        success: true,
        qrcode: Some(code.into()),
        instance_name: Some("tenet-1".into()),
        ..CreateInstanceResponse::default()
    }
}

impl ScriptedApi {
    pub fn push_status(&self, reply: PairingResult<StatusPayload>) -> &Self {
        self.push_status_after(Duration::ZERO, reply)
    }

    pub fn push_status_after(&self, delay: Duration, reply: PairingResult<StatusPayload>) -> &Self {
        self.status.lock().unwrap().push_back((delay, reply));
        self
    }

    pub fn push_create(&self, reply: PairingResult<CreateInstanceResponse>) -> &Self {
        self.create.lock().unwrap().push_back((Duration::ZERO, reply));
        self
    }

    pub fn push_qrcode(&self, reply: PairingResult<QrCodeResponse>) -> &Self {
        self.qrcode.lock().unwrap().push_back((Duration::ZERO, reply));
        self
    }

    pub fn push_disconnect(&self, reply: PairingResult<()>) -> &Self {
        self.disconnect.lock().unwrap().push_back((Duration::ZERO, reply));
        self
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    async fn next<T>(script: &Scripted<T>, default: impl FnOnce() -> T) -> PairingResult<T> {
        let entry = script.lock().unwrap().pop_front();
        match entry {
            Some((delay, reply)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                reply
            }
            None => Ok(default()),
        }
    }
}

#[async_trait]
impl InstanceApi for ScriptedApi {
    async fn status(&self) -> PairingResult<StatusPayload> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Self::next(&self.status, waiting).await
    }

    async fn create_instance(
        &self,
        _instance_name: Option<&str>,
    ) -> PairingResult<CreateInstanceResponse> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Self::next(&self.create, || qr("abc")).await
    }

    async fn qrcode(&self) -> PairingResult<QrCodeResponse> {
        self.qrcode_calls.fetch_add(1, Ordering::SeqCst);
        Self::next(&self.qrcode, || QrCodeResponse {
            success: true,
            qrcode: Some("fresh".into()),
            code: Some("2@fresh".into()),
        })
        .await
    }

    async fn disconnect(&self) -> PairingResult<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        Self::next(&self.disconnect, || ()).await
    }

    async fn token(&self) -> PairingResult<TokenResponse> {
        Ok(TokenResponse {
            token: Some("instance-token".into()),
            message: None,
        })
    }

    async fn health(&self) -> PairingResult<HealthResponse> {
        Ok(HealthResponse {
            healthy: true,
            reason: None,
        })
    }
}
