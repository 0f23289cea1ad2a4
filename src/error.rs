/*
 * Responsibility
 * - Application-wide AppError
 * - IntoResponse (HTTP status + JSON error body)
 * - Single place where service errors turn into client-visible failures
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::oidc::OidcError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Code exchange failures (unknown/expired/replayed code).
    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("service temporarily unavailable")]
    Unavailable,

    #[error("internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::InvalidGrant(_) => (StatusCode::BAD_REQUEST, "INVALID_GRANT"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::NotImplemented(_) => (StatusCode::NOT_IMPLEMENTED, "NOT_IMPLEMENTED"),
            AppError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            AppError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<OidcError> for AppError {
    fn from(e: OidcError) -> Self {
        match e {
            OidcError::CodeNotFound | OidcError::CodeExpired => {
                AppError::InvalidGrant(e.to_string())
            }
            OidcError::TokenMalformed
            | OidcError::TokenExpired
            | OidcError::TokenInvalidSignature
            | OidcError::SessionNotFound
            | OidcError::CredentialsNotFound(_)
            | OidcError::UnauthorizedAccess => AppError::Unauthorized,
            OidcError::NotImplemented(what) => AppError::NotImplemented(what),
            OidcError::Store(ref err) if err.is_retryable() => {
                tracing::warn!(error = %err, "store unavailable");
                AppError::Unavailable
            }
            other => {
                tracing::error!(error = %other, "unexpected oidc failure");
                AppError::Internal
            }
        }
    }
}
