//! Handler error type
//!
//! Every failure path renders a JSON body so clients can always parse the
//! response.

use super::types::ErrorResponse;
use crate::webhook::WebhookError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
    /// The target webhook answered with a failure status
    Upstream { status: u16, body: String },
    /// The target webhook could not be reached
    Unreachable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(msg)),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse::new(msg)),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new(msg))
            }
            AppError::Upstream { status, body } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                ErrorResponse::new("Webhook request failed")
                    .with_status(status)
                    .with_details(body),
            ),
            AppError::Unreachable(reason) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("Failed to reach webhook").with_details(reason),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(format!("Invalid query: {}", rejection.body_text()))
    }
}

impl From<WebhookError> for AppError {
    fn from(e: WebhookError) -> Self {
        match e {
            WebhookError::Upstream { status, body } => AppError::Upstream { status, body },
            WebhookError::InvalidUrl(msg) => AppError::BadRequest(format!("Invalid webhook URL: {msg}")),
            WebhookError::Transport(msg) => AppError::Unreachable(msg),
        }
    }
}
