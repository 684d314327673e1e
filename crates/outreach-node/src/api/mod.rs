//! HTTP handlers.

pub mod health;
pub mod research;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use outreach_core::{OutreachError, SendFailureClass};
use serde::Serialize;

/// Error body in the backend's `{"detail": ...}` shape.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub detail: String,
}

/// A failed request: status plus detail message.
#[derive(Debug)]
pub struct ApiError(pub StatusCode, pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorDetail { detail: self.1 })).into_response()
    }
}

impl From<OutreachError> for ApiError {
    fn from(err: OutreachError) -> Self {
        let status = match &err {
            OutreachError::NotFound { .. } => StatusCode::NOT_FOUND,
            OutreachError::GenerationFailed { reason: Some(_) } => StatusCode::BAD_REQUEST,
            OutreachError::SendFailed {
                class: SendFailureClass::Configuration,
                ..
            } => StatusCode::PRECONDITION_FAILED,
            OutreachError::SendFailed {
                class: SendFailureClass::Transient,
                ..
            } => StatusCode::BAD_GATEWAY,
            OutreachError::Rejected(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let detail = match &err {
            OutreachError::GenerationFailed { .. } | OutreachError::SendFailed { .. } => {
                err.user_message()
            }
            other => other.to_string(),
        };

        ApiError(status, detail)
    }
}
