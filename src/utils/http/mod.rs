use anyhow::{Context, Result, bail};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use std::time::Duration;

/// Default maximum body size for API responses (10 MB). QR payloads are
/// base64 PNGs, so this leaves plenty of room.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Build the API `reqwest::Client` with JSON headers and the configured timeouts.
pub fn build_api_client(connect_timeout: Duration, timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .default_headers(headers)
        .user_agent(concat!("sdrlink/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

/// Read a response body with a size limit.
///
/// - Checks the `Content-Length` header first; rejects immediately if over limit.
/// - Streams via `chunk()` with a running counter; rejects once the limit is crossed.
///
/// JSON bodies are useless when cut short, so unlike a download helper this
/// never returns a truncated body.
pub async fn limited_body(resp: Response, max_bytes: usize) -> Result<Vec<u8>> {
    if let Some(cl) = resp.content_length()
        && cl as usize > max_bytes
    {
        bail!(
            "response body too large: Content-Length {} exceeds limit {}",
            cl,
            max_bytes
        );
    }

    let mut buf = Vec::new();
    let mut stream = resp;
    while let Some(chunk) = stream.chunk().await? {
        if buf.len() + chunk.len() > max_bytes {
            bail!("response body too large: exceeds limit {}", max_bytes);
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

#[cfg(test)]
mod tests;
