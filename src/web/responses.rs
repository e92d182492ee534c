use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

/// Canonical `{ "message": ... }` body shared by every endpoint.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ApiMessage {
    pub message: String,
}

impl ApiMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Helper for controllers that need to return `(StatusCode, Json<ApiMessage>)`.
pub fn json_error(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiMessage>) {
    (status, Json(ApiMessage::new(message)))
}
