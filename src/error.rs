/*
 * Responsibility
 * - Transport-level error returned by the gate and handlers
 * - IntoResponse (HTTP status + JSON error body)
 * - AuthzError -> AppError classification
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::authz::AuthzError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("internal server error")]
    Internal,
}

#[derive(Debug, Serialize)]
struct ErrorResponseBody {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::Internal => "INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponseBody {
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

// Causes stay in the logs; the client only learns the outcome.
impl From<AuthzError> for AppError {
    fn from(e: AuthzError) -> Self {
        if e.is_client_fault() {
            return match e {
                AuthzError::InvalidArgument(msg) => AppError::InvalidRequest(msg),
                _ => AppError::InvalidRequest("unknown policy".into()),
            };
        }

        match e {
            AuthzError::Authentication { .. } => AppError::Unauthorized,
            AuthzError::Forbidden => AppError::Forbidden,
            _ => AppError::Internal,
        }
    }
}
