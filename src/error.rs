use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::web::ApiMessage;

pub type ServiceResult<T> = Result<T, ServiceError>;

pub const INTERNAL_ERROR_MESSAGE: &str = "服务器内部错误。";

/// Outcome of a failed account or page operation.
///
/// Domain failures are answered with `200 OK` and a `message` body; only
/// `Backend` is reported as a server error.
#[derive(Debug)]
pub enum ServiceError {
    NotFound(&'static str),
    Conflict(&'static str),
    Forbidden(&'static str),
    Unauthenticated(&'static str),
    WrongCredentials(&'static str),
    Validation(String),
    Backend(anyhow::Error),
}

impl ServiceError {
    pub fn message(&self) -> &str {
        match self {
            ServiceError::NotFound(message)
            | ServiceError::Conflict(message)
            | ServiceError::Forbidden(message)
            | ServiceError::Unauthenticated(message)
            | ServiceError::WrongCredentials(message) => message,
            ServiceError::Validation(message) => message,
            ServiceError::Backend(_) => INTERNAL_ERROR_MESSAGE,
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Backend(err) => write!(f, "backend failure: {err:#}"),
            other => write!(f, "{}", other.message()),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Backend(err)
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::Backend(err) => {
                error!(?err, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::OK,
        };
        (status, Json(ApiMessage::new(self.message()))).into_response()
    }
}
