//! HTTP control surface for the fire-alert bridge
//!
//! - `POST /user-token` with `{"userToken": "..."}` registers (or replaces)
//!   the push recipient
//! - `POST /test-push-notification` sends a fire-alert push to the current
//!   recipient right away
//!
//! Both reply `{"errorCode": "OK"}` on success. Failures carry a non-OK
//! `errorCode` and a matching HTTP status; nothing fails silently.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use firealert_core::Error;
use firealert_core::notifier::{PushNotifier, fire_alert_payload};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state for the control API
#[derive(Debug, Clone)]
pub struct ApiState {
    /// The same notifier the fire-alert handler pushes through
    pub notifier: Arc<PushNotifier>,
}

impl ApiState {
    /// Create API state around the shared notifier
    pub fn new(notifier: Arc<PushNotifier>) -> Self {
        Self { notifier }
    }
}

/// Body of `POST /user-token`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTokenRequest {
    #[serde(rename = "userToken")]
    pub user_token: String,
}

/// Response body for every endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(rename = "errorCode")]
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
}

impl ApiResponse {
    /// Success body: `{"errorCode": "OK"}`
    pub fn ok() -> Self {
        Self {
            error_code: "OK".to_string(),
            message: None,
        }
    }
}

/// Error returned by the control API handlers
#[derive(Debug)]
pub enum ApiError {
    /// Body was not valid JSON of the expected shape
    InvalidRequest(String),
    /// Core rejected or failed the operation
    Core(Error),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ApiError::Core(Error::InvalidArgument(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_ARGUMENT")
            }
            ApiError::Core(Error::NoRecipientConfigured) => {
                (StatusCode::CONFLICT, "NO_RECIPIENT_CONFIGURED")
            }
            ApiError::Core(Error::Push { .. }) => (StatusCode::BAD_GATEWAY, "PUSH_FAILED"),
            ApiError::Core(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Core(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            ApiError::InvalidRequest(msg) => msg.clone(),
            ApiError::Core(err) => err.to_string(),
        };
        warn!("Control API request failed ({}): {}", code, message);

        let body = ApiResponse {
            error_code: code.to_string(),
            message: Some(message),
        };
        (status, Json(body)).into_response()
    }
}

/// Create all control API routes with state
pub fn create_routes(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/user-token", post(register_user_token))
        .route("/test-push-notification", post(test_push_notification))
        .with_state(state)
}

async fn register_user_token(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<UserTokenRequest>, JsonRejection>,
) -> Result<Json<ApiResponse>, ApiError> {
    let Json(request) = payload?;
    state.notifier.update_recipient(request.user_token).await?;
    info!("Registered new push recipient");
    Ok(Json(ApiResponse::ok()))
}

async fn test_push_notification(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ApiResponse>, ApiError> {
    let message_id = state.notifier.try_push(fire_alert_payload()).await?;
    info!("Test push notification sent: {}", message_id);
    Ok(Json(ApiResponse::ok()))
}
