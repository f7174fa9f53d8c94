use super::InstanceApi;
use super::types::{
    CreateInstanceRequest, CreateInstanceResponse, ErrorBody, HealthResponse, LoginRequest,
    LoginResponse, QrCodeResponse, StatusPayload, TokenResponse,
};
use crate::config::ApiConfig;
use crate::errors::{PairingError, PairingResult};
use crate::session::{SessionContext, UserProfile};
use crate::utils::http::{DEFAULT_MAX_BODY_BYTES, build_api_client, limited_body};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Header carrying the selected agency for super admins acting on a tenant.
pub const AGENCY_HEADER: &str = "X-Agency-Id";

/// REST client for the SDR backend. Auth comes from the injected
/// [`SessionContext`], never from process-wide state.
pub struct HttpApiClient {
    http: Client,
    base_url: String,
    session: SessionContext,
}

impl HttpApiClient {
    pub fn new(config: &ApiConfig, session: SessionContext) -> PairingResult<Self> {
        let parsed = url::Url::parse(&config.base_url)
            .map_err(|e| PairingError::Config(format!("invalid api.baseUrl: {}", e)))?;
        let http = build_api_client(config.connect_timeout(), config.timeout())?;
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            session,
        })
    }

    #[must_use]
    pub fn with_session(mut self, session: SessionContext) -> Self {
        self.session = session;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        let mut req = req;
        if self.session.is_authenticated() {
            req = req.bearer_auth(self.session.token());
        }
        if let Some(agency) = self.session.agency_header() {
            req = req.header(AGENCY_HEADER, agency);
        }
        req
    }

    /// Send the request and return the body of a 2xx response.
    async fn execute(&self, label: &str, req: RequestBuilder) -> PairingResult<Vec<u8>> {
        let resp = self.authorize(req).send().await.map_err(|e| {
            warn!("{} failed without response: {}", label, e);
            PairingError::Transport(e.to_string())
        })?;
        let status = resp.status();
        debug!("{} -> {}", label, status);

        let body = limited_body(resp, DEFAULT_MAX_BODY_BYTES)
            .await
            .map_err(|e| PairingError::Transport(format!("{:#}", e)))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(error_from_response(status, &body))
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> PairingResult<T> {
        let label = format!("GET {}", path);
        let body = self
            .execute(&label, self.http.get(self.endpoint(path)))
            .await?;
        decode(&label, &body)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &B,
    ) -> PairingResult<T> {
        let label = format!("POST {}", path);
        let body = self
            .execute(&label, self.http.post(self.endpoint(path)).json(payload))
            .await?;
        decode(&label, &body)
    }

    /// Exchange credentials for a token. Does not need an authenticated session.
    pub async fn login(&self, email: &str, password: &str) -> PairingResult<LoginResponse> {
        self.post_json("/auth/login", &LoginRequest { email, password })
            .await
    }

    pub async fn me(&self) -> PairingResult<UserProfile> {
        self.get_json("/auth/me").await
    }
}

#[async_trait]
impl InstanceApi for HttpApiClient {
    async fn status(&self) -> PairingResult<StatusPayload> {
        self.get_json("/whatsapp/instance/status").await
    }

    async fn create_instance(
        &self,
        instance_name: Option<&str>,
    ) -> PairingResult<CreateInstanceResponse> {
        self.post_json(
            "/whatsapp/instance/create",
            &CreateInstanceRequest { instance_name },
        )
        .await
    }

    async fn qrcode(&self) -> PairingResult<QrCodeResponse> {
        self.get_json("/whatsapp/instance/qrcode").await
    }

    async fn disconnect(&self) -> PairingResult<()> {
        let path = "/whatsapp/instance/disconnect";
        self.execute(&format!("POST {}", path), self.http.post(self.endpoint(path)))
            .await?;
        Ok(())
    }

    async fn token(&self) -> PairingResult<TokenResponse> {
        self.get_json("/whatsapp/instance/token").await
    }

    async fn health(&self) -> PairingResult<HealthResponse> {
        self.get_json("/whatsapp/instance/health").await
    }
}

fn decode<T: DeserializeOwned>(label: &str, body: &[u8]) -> PairingResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| PairingError::Transport(format!("invalid response from {}: {}", label, e)))
}

/// Map a non-2xx response to the error taxonomy. `detail` is kept verbatim.
pub(crate) fn error_from_response(status: StatusCode, body: &[u8]) -> PairingError {
    let detail = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail_text())
        .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));

    if status == StatusCode::UNAUTHORIZED {
        PairingError::Unauthorized { detail }
    } else {
        PairingError::Server {
            status: status.as_u16(),
            detail,
        }
    }
}
