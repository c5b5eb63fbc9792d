//! Generic LLM client for OpenAI-compatible endpoints.
//!
//! Checkpoints are served by vLLM, TGI, Ollama or llama.cpp and addressed by
//! the model id the server registered them under.

use crate::models::{ApiError, Message, ModelSpec, PrefbenchError, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Chat completion request payload.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f64,
}

/// Chat completion response.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// API error response (OpenAI-compatible).
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Longest wait honoured from a `Retry-After` header.
const MAX_RETRY_AFTER_SECS: f64 = 60.0;

/// Seconds to wait before retrying a 429.
///
/// Missing, unparsable, negative or non-finite values fall back to one
/// second; large values are capped at [`MAX_RETRY_AFTER_SECS`].
fn parse_retry_after(value: Option<&str>) -> f64 {
    value
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map_or(1.0, |secs| secs.min(MAX_RETRY_AFTER_SECS))
}

/// Response from a completion request.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content (may be empty)
    pub content: String,
    /// Model used (may differ from requested)
    pub model: String,
    /// Input tokens
    pub input_tokens: u32,
    /// Output tokens
    pub output_tokens: u32,
    /// Request duration
    pub duration: Duration,
}

/// Client for one OpenAI-compatible endpoint.
///
/// Features:
/// - Bearer auth when a key is configured
/// - Custom headers
/// - Bounded retry with exponential backoff on transient failures
/// - Token usage tracking
pub struct LLMClient {
    client: reqwest::Client,
    /// Name of this endpoint (for logging)
    name: String,
    /// API key (None for local endpoints without auth)
    api_key: Option<String>,
    /// Base URL for the API, without trailing slash
    base_url: String,
    /// Custom headers to include in requests
    custom_headers: HashMap<String, String>,
    /// Request timeout
    timeout: Duration,
    /// Maximum attempts per request
    max_retries: u32,
    total_input_tokens: AtomicU64,
    total_output_tokens: AtomicU64,
}

impl LLMClient {
    /// Create a new LLM client.
    ///
    /// # Arguments
    /// - `name`: Endpoint name for logging (e.g., "local")
    /// - `api_key`: Optional API key (None for local endpoints)
    /// - `base_url`: Base URL for the API
    /// - `custom_headers`: Additional headers to include in requests
    /// - `timeout_secs`: Request timeout in seconds
    /// - `max_retries`: Maximum attempts per request (at least one is made)
    pub fn new(
        name: String,
        api_key: Option<String>,
        base_url: String,
        custom_headers: HashMap<String, String>,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PrefbenchError::Network)?;

        Ok(Self {
            client,
            name,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            custom_headers,
            timeout,
            max_retries: max_retries.max(1),
            total_input_tokens: AtomicU64::new(0),
            total_output_tokens: AtomicU64::new(0),
        })
    }

    /// Get the endpoint name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build headers for a request.
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(api_key) = &self.api_key {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (key, value) in &self.custom_headers {
            if let (Ok(name), Ok(val)) = (
                HeaderName::try_from(key.as_str()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, val);
            }
        }

        headers
    }

    fn backoff(attempt: u32) -> Duration {
        Duration::from_secs(2u64.pow(attempt.min(5)))
    }

    /// Complete a chat request.
    ///
    /// Retries transient failures (network, timeout, 429, 5xx) up to
    /// `max_retries` attempts. A 429 waits for the server's `Retry-After`.
    pub async fn complete(
        &self,
        model: &ModelSpec,
        messages: &[Message],
        max_tokens: Option<u32>,
    ) -> Result<CompletionResponse> {
        let start = Instant::now();

        let request = ChatCompletionRequest {
            model: &model.id,
            messages,
            max_tokens: max_tokens.unwrap_or(model.max_tokens),
            temperature: model.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);

        for attempt in 0..self.max_retries {
            let error = match self.send_once(&url, &request, model, start).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if !error.is_retryable() || attempt + 1 == self.max_retries {
                return Err(error);
            }

            let delay = match &error {
                PrefbenchError::Api(ApiError::RateLimited { retry_after_secs }) => {
                    Duration::try_from_secs_f64(*retry_after_secs)
                        .unwrap_or(Duration::from_secs(1))
                }
                _ => Self::backoff(attempt),
            };

            debug!(
                endpoint = %self.name,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying request"
            );
            tokio::time::sleep(delay).await;
        }

        Err(PrefbenchError::Api(ApiError::MaxRetriesExceeded {
            attempts: self.max_retries,
            last_error: "no attempt made".to_string(),
        }))
    }

    /// One request/response round trip, classified into a typed error.
    async fn send_once(
        &self,
        url: &str,
        request: &ChatCompletionRequest<'_>,
        model: &ModelSpec,
        start: Instant,
    ) -> Result<CompletionResponse> {
        let response = self
            .client
            .post(url)
            .headers(self.headers())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PrefbenchError::Timeout(self.timeout)
                } else {
                    PrefbenchError::Network(e)
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = parse_retry_after(
                response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok()),
            );
            return Err(PrefbenchError::Api(ApiError::RateLimited {
                retry_after_secs: retry_after,
            }));
        }

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error = match status {
                401 => ApiError::AuthenticationFailed,
                404 => ApiError::ModelNotFound(model.id.clone()),
                _ => ApiError::Status {
                    status,
                    message: serde_json::from_str::<ApiErrorResponse>(&error_body)
                        .map(|e| e.error.message)
                        .unwrap_or(error_body),
                },
            };
            return Err(PrefbenchError::Api(error));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|e| {
            PrefbenchError::Api(ApiError::InvalidResponse(format!(
                "Failed to parse response: {e}"
            )))
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| {
                PrefbenchError::Api(ApiError::InvalidResponse(
                    "No choices in response".to_string(),
                ))
            })?;

        let usage = body.usage.unwrap_or_default();

        self.total_input_tokens
            .fetch_add(u64::from(usage.prompt_tokens), Ordering::Relaxed);
        self.total_output_tokens
            .fetch_add(u64::from(usage.completion_tokens), Ordering::Relaxed);

        Ok(CompletionResponse {
            content,
            model: body.model.unwrap_or_else(|| model.id.clone()),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            duration: start.elapsed(),
        })
    }

    /// Get total tokens tracked as (input, output).
    pub fn total_tokens(&self) -> (u64, u64) {
        (
            self.total_input_tokens.load(Ordering::Relaxed),
            self.total_output_tokens.load(Ordering::Relaxed),
        )
    }

    /// Health check: ping the /models endpoint.
    pub async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let url = format!("{}/models", self.base_url);

        match self
            .client
            .get(&url)
            .headers(self.headers())
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(response) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                if response.status().is_success() {
                    HealthCheckResult {
                        endpoint: self.name.clone(),
                        status: HealthStatus::Healthy,
                        latency_ms: Some(latency_ms),
                        error: None,
                    }
                } else {
                    HealthCheckResult {
                        endpoint: self.name.clone(),
                        status: HealthStatus::Unhealthy,
                        latency_ms: Some(latency_ms),
                        error: Some(format!("HTTP {}", response.status().as_u16())),
                    }
                }
            }
            Err(e) => HealthCheckResult {
                endpoint: self.name.clone(),
                status: HealthStatus::Unreachable,
                latency_ms: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Health check result.
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    /// Endpoint name
    pub endpoint: String,
    /// Health status
    pub status: HealthStatus,
    /// Latency in milliseconds (if reachable)
    pub latency_ms: Option<u64>,
    /// Error message (if unhealthy or unreachable)
    pub error: Option<String>,
}

/// Health status of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Endpoint is responding normally
    Healthy,
    /// Endpoint is responding but with errors
    Unhealthy,
    /// Endpoint is not reachable
    Unreachable,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Unreachable => write!(f, "unreachable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response per connection, `count` times.
    async fn serve(status_line: &'static str, body: &'static str, count: usize) -> String {
        serve_sequence(std::iter::repeat_n((status_line, "", body), count).collect()).await
    }

    /// Serve `(status line, extra header lines, body)` replies in order, one per connection.
    async fn serve_sequence(replies: Vec<(&'static str, &'static str, &'static str)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for (status_line, extra_headers, body) in replies {
                let (mut socket, _) = listener.accept().await.unwrap();
                read_request(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\n{extra_headers}Content-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        format!("http://{addr}/v1")
    }

    /// Read headers and a Content-Length body.
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    return;
                }
            }
        }
    }

    fn client(base_url: String, max_retries: u32) -> LLMClient {
        LLMClient::new(
            "test".to_string(),
            Some("sk-test".to_string()),
            base_url,
            HashMap::new(),
            5,
            max_retries,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_complete_success() {
        let base_url = serve(
            "200 OK",
            r#"{"model":"dpo","choices":[{"message":{"role":"assistant","content":"Light scatters."}}],"usage":{"prompt_tokens":12,"completion_tokens":3,"total_tokens":15}}"#,
            1,
        )
        .await;

        let client = client(base_url, 1);
        let response = client
            .complete(&ModelSpec::new("dpo"), &[Message::user("Why is the sky blue?")], Some(32))
            .await
            .unwrap();

        assert_eq!(response.content, "Light scatters.");
        assert_eq!(response.model, "dpo");
        assert_eq!(response.output_tokens, 3);
        assert_eq!(client.total_tokens(), (12, 3));
    }

    #[tokio::test]
    async fn test_complete_model_not_found() {
        let base_url = serve(
            "404 Not Found",
            r#"{"error":{"message":"The model `missing` does not exist."}}"#,
            1,
        )
        .await;

        let err = client(base_url, 3)
            .complete(&ModelSpec::new("missing"), &[Message::user("hi")], None)
            .await
            .unwrap_err();

        assert!(err.is_model_missing());
        assert_eq!(err.to_string(), "Model not found: missing");
    }

    #[tokio::test]
    async fn test_complete_empty_choices() {
        let base_url = serve("200 OK", r#"{"choices":[]}"#, 1).await;

        let err = client(base_url, 1)
            .complete(&ModelSpec::new("m"), &[Message::user("hi")], None)
            .await
            .unwrap_err();

        assert!(matches!(err, PrefbenchError::Api(ApiError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_complete_server_error_message() {
        let base_url = serve(
            "400 Bad Request",
            r#"{"error":{"message":"max_tokens is too large"}}"#,
            1,
        )
        .await;

        let err = client(base_url, 2)
            .complete(&ModelSpec::new("m"), &[Message::user("hi")], None)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "API error (status 400): max_tokens is too large"
        );
    }

    const OK_BODY: &str = r#"{"choices":[{"message":{"role":"assistant","content":"Done."}}]}"#;

    #[tokio::test]
    async fn test_complete_retries_server_error() {
        let base_url = serve_sequence(vec![
            ("503 Service Unavailable", "", r#"{"error":{"message":"loading"}}"#),
            ("200 OK", "", OK_BODY),
        ])
        .await;

        let response = client(base_url, 2)
            .complete(&ModelSpec::new("m"), &[Message::user("hi")], None)
            .await
            .unwrap();
        assert_eq!(response.content, "Done.");
    }

    #[tokio::test]
    async fn test_complete_retries_rate_limit() {
        let base_url = serve_sequence(vec![
            ("429 Too Many Requests", "Retry-After: 0\r\n", "{}"),
            ("200 OK", "", OK_BODY),
        ])
        .await;

        let response = client(base_url, 2)
            .complete(&ModelSpec::new("m"), &[Message::user("hi")], None)
            .await
            .unwrap();
        assert_eq!(response.content, "Done.");
    }

    #[tokio::test]
    async fn test_negative_retry_after_falls_back_to_default_wait() {
        let base_url = serve_sequence(vec![
            ("429 Too Many Requests", "Retry-After: -1\r\n", "{}"),
            ("429 Too Many Requests", "Retry-After: -1\r\n", "{}"),
        ])
        .await;

        let err = client(base_url, 2)
            .complete(&ModelSpec::new("m"), &[Message::user("hi")], None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PrefbenchError::Api(ApiError::RateLimited { retry_after_secs }) if retry_after_secs == 1.0
        ));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        // A second request would find no listener and fail with a network error.
        let base_url = serve("401 Unauthorized", "{}", 1).await;

        let err = client(base_url, 3)
            .complete(&ModelSpec::new("m"), &[Message::user("hi")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, PrefbenchError::Api(ApiError::AuthenticationFailed)));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(Some("2.5")), 2.5);
        assert_eq!(parse_retry_after(Some(" 0 ")), 0.0);
        assert_eq!(parse_retry_after(Some("-1")), 1.0);
        assert_eq!(parse_retry_after(Some("NaN")), 1.0);
        assert_eq!(parse_retry_after(Some("inf")), 1.0);
        assert_eq!(parse_retry_after(Some("1e300")), MAX_RETRY_AFTER_SECS);
        assert_eq!(parse_retry_after(Some("Wed, 21 Oct 2015 07:28:00 GMT")), 1.0);
        assert_eq!(parse_retry_after(None), 1.0);
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = client(format!("http://{addr}/v1"), 1).health_check().await;
        assert_eq!(result.status, HealthStatus::Unreachable);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_health_check_healthy() {
        let base_url = serve("200 OK", r#"{"data":[]}"#, 1).await;
        let result = client(base_url, 1).health_check().await;
        assert_eq!(result.status, HealthStatus::Healthy);
        assert_eq!(result.endpoint, "test");
    }
}
