//! HTTP client construction, headers and status mapping.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL, CONTENT_TYPE};

use crate::error::PilotError;

/// Build a client with a connect timeout and no overall read timeout.
///
/// Streaming generations can run for minutes, so the stream is ended by the
/// `[DONE]` sentinel or the server closing, never by an idle timer. Callers
/// that want a bound (non-streaming completions, health probes) set one per
/// request.
pub fn build_client(connect_timeout: Duration) -> Result<reqwest::Client, PilotError> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .pool_max_idle_per_host(2)
        .build()
        .map_err(PilotError::Transport)
}

/// Headers for a JSON request/response exchange.
pub fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// Headers for an SSE exchange.
pub fn sse_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers
}

/// Join a base URL and an absolute path without doubling slashes.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Turn a non-2xx response into [`PilotError::Http`], keeping the body.
pub async fn error_for_status(resp: reqwest::Response) -> Result<reqwest::Response, PilotError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(PilotError::http(status.as_u16(), body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(
            endpoint("http://127.0.0.1:18080/", "/v1/chat/completions"),
            "http://127.0.0.1:18080/v1/chat/completions"
        );
        assert_eq!(endpoint("http://h:1", "/health"), "http://h:1/health");
    }
}
