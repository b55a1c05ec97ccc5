//! API error types and responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use sideshow_core::TrustError;

use crate::service::ServiceError;
use crate::storage::StorageError;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Accounts do not match")]
    Mismatch { claimed: String, proven: String },

    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Signing key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// API error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                None,
            ),
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                msg.clone(),
                None,
            ),
            ApiError::VerificationFailed(msg) => (
                StatusCode::FORBIDDEN,
                "VERIFICATION_FAILED",
                msg.clone(),
                None,
            ),
            ApiError::Mismatch { claimed, proven } => (
                StatusCode::CONFLICT,
                "ACCOUNT_MISMATCH",
                "Verified email does not match the claimed email".to_string(),
                Some(serde_json::json!({
                    "claimed": claimed,
                    "proven": proven,
                })),
            ),
            ApiError::ProviderUnavailable(msg) => (
                StatusCode::BAD_GATEWAY,
                "PROVIDER_UNAVAILABLE",
                msg.clone(),
                None,
            ),
            ApiError::KeyUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "KEY_UNAVAILABLE",
                msg.clone(),
                None,
            ),
            ApiError::SigningFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SIGNING_FAILED",
                msg.clone(),
                None,
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
                None,
            ),
        };

        if status.is_server_error() {
            error!(code = code, error = %message, "Request failed");
        }

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<TrustError> for ApiError {
    fn from(err: TrustError) -> Self {
        match err {
            TrustError::Input(msg) => ApiError::BadRequest(msg),
            TrustError::Authorization(msg) => ApiError::Unauthorized(msg),
            TrustError::Adapter(msg) => ApiError::VerificationFailed(msg),
            TrustError::Mismatch { claimed, proven } => ApiError::Mismatch { claimed, proven },
            TrustError::KeyProvisioning(msg) => ApiError::KeyUnavailable(msg),
            TrustError::Signing(msg) => ApiError::SigningFailed(msg),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Trust(e) => e.into(),
            ServiceError::Initiate(e) => ApiError::ProviderUnavailable(e.to_string()),
            ServiceError::Storage(e) => e.into(),
        }
    }
}
