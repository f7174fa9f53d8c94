use super::*;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn test_build_api_client() {
    let client = build_api_client(Duration::from_secs(10), Duration::from_secs(30));
    assert!(client.is_ok());
}

#[test]
fn test_default_max_body_bytes() {
    assert_eq!(DEFAULT_MAX_BODY_BYTES, 10 * 1024 * 1024);
}

async fn get_response(server: &MockServer) -> Response {
    Client::new().get(server.uri()).send().await.unwrap()
}

#[tokio::test]
async fn test_limited_body_under_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello world"))
        .mount(&server)
        .await;
    let resp = get_response(&server).await;
    let result = limited_body(resp, 1024).await.unwrap();
    assert_eq!(result, b"hello world");
}

#[tokio::test]
async fn test_limited_body_exact_limit() {
    let body = vec![b'x'; 100];
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;
    let resp = get_response(&server).await;
    let result = limited_body(resp, 100).await.unwrap();
    assert_eq!(result, body);
}

#[tokio::test]
async fn test_limited_body_content_length_over_limit_rejects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 10000]))
        .mount(&server)
        .await;
    let resp = get_response(&server).await;
    let result = limited_body(resp, 100).await;
    assert!(result.is_err());
    let msg = result.unwrap_err().to_string();
    assert!(msg.contains("too large"));
}

#[tokio::test]
async fn test_limited_body_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let resp = get_response(&server).await;
    let result = limited_body(resp, 1024).await.unwrap();
    assert!(result.is_empty());
}
