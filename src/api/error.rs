//! HTTP error mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::error::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] Error),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Domain(err) => match err {
                Error::InvalidPhase { .. } => (StatusCode::BAD_REQUEST, "INVALID_PHASE"),
                Error::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                Error::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
                Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                Error::PhaseNotFound(_) => (StatusCode::NOT_FOUND, "PHASE_NOT_FOUND"),
                Error::AlreadyTerminal(_) => (StatusCode::CONFLICT, "ALREADY_TERMINAL"),
                Error::AlreadyAtStart(_) => (StatusCode::CONFLICT, "ALREADY_AT_START"),
                Error::NotInTerminalPhase { .. } => {
                    (StatusCode::CONFLICT, "NOT_IN_TERMINAL_PHASE")
                }
                Error::PhaseNotWinnerEligible(_) => {
                    (StatusCode::CONFLICT, "PHASE_NOT_WINNER_ELIGIBLE")
                }
                Error::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
                Error::WinnerAlreadyDeclared { .. } => {
                    (StatusCode::CONFLICT, "WINNER_ALREADY_DECLARED")
                }
                Error::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                Error::Config(_) | Error::Database(_) | Error::Io(_) | Error::Other(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, code, "request rejected");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}
