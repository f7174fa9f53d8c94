// Shared test helpers; not all items used by every test binary.
#![allow(unused)]

use sdrlink::api::HttpApiClient;
use sdrlink::config::{ApiConfig, PairingConfig};
use sdrlink::session::SessionContext;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "test-token";
pub const AGENCY: &str = "ag-1";

pub const STATUS_PATH: &str = "/api/whatsapp/instance/status";
pub const CREATE_PATH: &str = "/api/whatsapp/instance/create";
pub const QRCODE_PATH: &str = "/api/whatsapp/instance/qrcode";
pub const DISCONNECT_PATH: &str = "/api/whatsapp/instance/disconnect";

/// Authenticated session pinned to [`AGENCY`].
pub fn agency_session() -> SessionContext {
    let mut session = SessionContext::with_token(TOKEN);
    session.pin_agency(AGENCY);
    session
}

pub fn api_config(server: &MockServer) -> ApiConfig {
    ApiConfig {
        base_url: format!("{}/api", server.uri()),
        ..ApiConfig::default()
    }
}

pub fn client(server: &MockServer) -> HttpApiClient {
    HttpApiClient::new(&api_config(server), agency_session()).unwrap()
}

/// Fast timings so flows finish in a couple of seconds of wall time.
pub fn fast_pairing() -> PairingConfig {
    PairingConfig {
        poll_interval_secs: 1,
        backoff_max_secs: 2,
        ..PairingConfig::default()
    }
}

pub fn waiting_body() -> Value {
    json!({"success": true, "connected": false, "status": "connecting"})
}

pub fn connected_body() -> Value {
    json!({
        "success": true,
        "connected": true,
        "status": "open",
        "phone_number": "5511999999999",
        "profile_name": "Loja Centro",
        "instance_name": "tenet-ag-1"
    })
}

pub async fn mount_json(server: &MockServer, verb: &str, route: &str, status: u16, body: Value) {
    Mock::given(method(verb))
        .and(path(route))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .and(header("x-agency-id", AGENCY))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

/// Status endpoint that answers `waiting` for the first `waiting` calls, then
/// `connected`.
pub async fn mount_status_sequence(server: &MockServer, waiting: u64) {
    if waiting > 0 {
        Mock::given(method("GET"))
            .and(path(STATUS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(waiting_body()))
            .up_to_n_times(waiting)
            .with_priority(1)
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(connected_body()))
        .with_priority(2)
        .mount(server)
        .await;
}

pub async fn requests_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}
