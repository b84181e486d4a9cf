// # FCM Push Backend
//
// This crate provides a Firebase Cloud Messaging (HTTP v1) implementation of
// the `PushBackend` interface for the fire-alert bridge.
//
// ## Behavior
//
// - One HTTP request per `send` call; no retry, no backoff, no queueing
// - HTTP timeout configured (30 seconds) so a hung backend cannot stall a
//   handler forever
// - Specific error messages for HTTP status codes (400, 401/403, 404, 429, 5xx)
// - Lazy, idempotent client initialization: the HTTP client is built once,
//   even if `initialize` races with itself or with the first `send`
// - Dry-run mode for running the bridge without delivering anything
//
// ## Security Requirements
//
// - The access token NEVER appears in logs or `Debug` output
// - A live backend fails fast if the token is empty
//
// ## API Reference
//
// - Send: POST `/v1/projects/:project_id/messages:send`
// - Body: `{"message": {"token", "data", "android": {"priority", "ttl"}}}`
// - Response: `{"name": "projects/:project_id/messages/:message_id"}`

use async_trait::async_trait;
use firealert_core::config::PushPriority;
use firealert_core::traits::{PushBackend, PushMessage};
use firealert_core::{Error, Result};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::OnceCell;

/// FCM API base URL
const FCM_API_BASE: &str = "https://fcm.googleapis.com";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const BACKEND_NAME: &str = "fcm";

/// Firebase Cloud Messaging push backend
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, `send` logs the request it would make and returns
/// a synthetic message id without touching the network.
pub struct FcmBackend {
    /// Firebase project id
    project_id: String,

    /// OAuth2 access token with the `firebase.messaging` scope
    /// ⚠️ NEVER log this value
    access_token: String,

    /// API base URL (overridable for tests and proxies)
    api_base: String,

    /// HTTP client, built on first use
    client: OnceCell<reqwest::Client>,

    /// Dry-run mode: if true, log instead of sending
    dry_run: bool,
}

// Custom Debug implementation that hides the access token
impl std::fmt::Debug for FcmBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FcmBackend")
            .field("project_id", &self.project_id)
            .field("access_token", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .field("initialized", &self.client.initialized())
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl FcmBackend {
    /// Create a new FCM backend
    ///
    /// # Parameters
    ///
    /// - `project_id`: Firebase project id
    /// - `access_token`: OAuth2 access token (may be empty in dry-run mode)
    /// - `dry_run`: If true, log messages instead of sending them
    pub fn new(
        project_id: impl Into<String>,
        access_token: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let project_id = project_id.into();
        let access_token = access_token.into();

        if project_id.trim().is_empty() {
            return Err(Error::config("FCM project id cannot be empty"));
        }
        if access_token.is_empty() && !dry_run {
            return Err(Error::config(
                "FCM access token cannot be empty (use dry-run mode to run without one)",
            ));
        }

        Ok(Self {
            project_id,
            access_token,
            api_base: FCM_API_BASE.to_string(),
            client: OnceCell::new(),
            dry_run,
        })
    }

    /// Create a backend that delivers messages
    pub fn new_live(
        project_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        Self::new(project_id, access_token, false)
    }

    /// Create a backend that only logs messages
    pub fn new_dry_run(project_id: impl Into<String>) -> Result<Self> {
        Self::new(project_id, "", true)
    }

    /// Use a different API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether the HTTP client has been built
    pub fn is_initialized(&self) -> bool {
        self.client.initialized()
    }

    /// Whether this backend only logs
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.api_base, self.project_id
        )
    }

    /// Get the HTTP client, building it exactly once
    async fn client(&self) -> Result<&reqwest::Client> {
        self.client
            .get_or_try_init(|| async {
                tracing::debug!("Building FCM HTTP client");
                reqwest::Client::builder()
                    .timeout(DEFAULT_HTTP_TIMEOUT)
                    .build()
                    .map_err(|e| {
                        Error::push(BACKEND_NAME, format!("Failed to build HTTP client: {}", e))
                    })
            })
            .await
    }
}

/// Build the FCM v1 request body for `message`
pub fn build_request_body(message: &PushMessage) -> Value {
    let priority = match message.priority {
        PushPriority::High => "HIGH",
        PushPriority::Normal => "NORMAL",
    };

    json!({
        "message": {
            "token": message.recipient,
            "data": message.data,
            "android": {
                "priority": priority,
                "ttl": format!("{}s", message.ttl.as_secs()),
            },
        }
    })
}

/// Map a non-success HTTP status to an error
fn status_error(status: reqwest::StatusCode, error_text: &str) -> Error {
    let message = match status.as_u16() {
        400 => format!("Invalid message (check recipient token): {} - {}", status, error_text),
        401 | 403 => format!(
            "Authentication failed: Invalid access token or insufficient permissions. Status: {}",
            status
        ),
        404 => format!("Recipient token is not registered: {} - {}", status, error_text),
        429 => format!("Quota exceeded. Status: {}", status),
        500..=599 => format!("FCM server error (transient): {} - {}", status, error_text),
        _ => format!("Send failed: {} - {}", status, error_text),
    };
    Error::push(BACKEND_NAME, message)
}

#[async_trait]
impl PushBackend for FcmBackend {
    async fn initialize(&self) -> Result<()> {
        self.client().await.map(|_| ())
    }

    async fn send(&self, message: &PushMessage) -> Result<String> {
        let url = self.send_url();
        let body = build_request_body(message);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with data: {:?}",
                url,
                message.data
            );
            return Ok(format!("projects/{}/messages/dry-run", self.project_id));
        }

        let client = self.client().await?;
        let response = client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::push(BACKEND_NAME, format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &error_text));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| Error::push(BACKEND_NAME, format!("Failed to parse response: {}", e)))?;

        let message_id = json["name"].as_str().ok_or_else(|| {
            Error::push(BACKEND_NAME, "Invalid response format: name is not a string")
        })?;

        Ok(message_id.to_string())
    }

    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn message() -> PushMessage {
        PushMessage {
            data: BTreeMap::from([("action".to_string(), "fire-alert".to_string())]),
            recipient: "device-token".to_string(),
            priority: PushPriority::High,
            ttl: Duration::from_secs(60),
        }
    }

    /// Serve one HTTP response and hand back the raw request
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\
                 Connection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        (base, handle)
    }

    #[test]
    fn test_request_body_shape() {
        let body = build_request_body(&message());
        assert_eq!(body["message"]["token"], "device-token");
        assert_eq!(body["message"]["data"]["action"], "fire-alert");
        assert_eq!(body["message"]["android"]["priority"], "HIGH");
        assert_eq!(body["message"]["android"]["ttl"], "60s");
    }

    #[test]
    fn test_live_backend_requires_token() {
        assert!(FcmBackend::new_live("project", "").is_err());
        assert!(FcmBackend::new_live("", "token").is_err());
        assert!(FcmBackend::new_dry_run("project").is_ok());
    }

    #[test]
    fn test_access_token_not_exposed_in_debug() {
        let backend = FcmBackend::new_live("project", "secret_token_12345").unwrap();

        let debug_str = format!("{:?}", backend);
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("FcmBackend"));
    }

    #[test]
    fn test_status_errors_are_descriptive() {
        let err = status_error(reqwest::StatusCode::UNAUTHORIZED, "");
        assert!(err.to_string().contains("Authentication failed"));
        let err = status_error(reqwest::StatusCode::SERVICE_UNAVAILABLE, "busy");
        assert!(err.to_string().contains("transient"));
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let backend = Arc::new(FcmBackend::new_live("project", "token").unwrap());
        assert!(!backend.is_initialized());

        let (a, b) = tokio::join!(backend.initialize(), backend.initialize());
        a.unwrap();
        b.unwrap();
        backend.initialize().await.unwrap();

        assert!(backend.is_initialized());
    }

    #[tokio::test]
    async fn test_dry_run_does_not_send() {
        let backend = FcmBackend::new_dry_run("project")
            .unwrap()
            .with_api_base("http://127.0.0.1:9");

        let id = backend.send(&message()).await.unwrap();

        assert_eq!(id, "projects/project/messages/dry-run");
    }

    #[tokio::test]
    async fn test_send_returns_message_id() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"name":"projects/project/messages/0:12345"}"#,
        )
        .await;
        let backend = FcmBackend::new_live("project", "token").unwrap().with_api_base(base);

        let id = backend.send(&message()).await.unwrap();

        assert_eq!(id, "projects/project/messages/0:12345");
        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/projects/project/messages:send"));
        assert!(request.to_lowercase().contains("authorization: bearer token"));
        assert!(request.contains("device-token"));
    }

    #[tokio::test]
    async fn test_send_maps_http_errors() {
        let (base, server) = serve_once("HTTP/1.1 404 Not Found", r#"{"error":{}}"#).await;
        let backend = FcmBackend::new_live("project", "token").unwrap().with_api_base(base);

        let err = backend.send(&message()).await.unwrap_err();

        assert!(matches!(err, Error::Push { .. }));
        assert!(err.to_string().contains("not registered"));
        server.await.unwrap();
    }
}
