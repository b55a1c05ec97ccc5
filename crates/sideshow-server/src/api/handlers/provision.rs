//! Certificate Provisioning Handlers
//!
//! A browser that has proven its email asks here for a certificate binding
//! that email to a public key it generated.

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::{extract::State, response::IntoResponse, response::Response, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::session::Session;

use super::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ProvisionResponse {
    /// Email a certificate may be requested for, empty if none
    pub certify: String,
}

/// Request to certify a public key
///
/// Fields are loosely typed so that any JSON object reaches the trust
/// check; a non-string email simply fails authorization.
#[derive(Debug, Deserialize)]
pub struct CertifyRequest {
    #[serde(default)]
    pub email: Value,

    /// Public key to certify, as a JSON object or a string holding one
    #[serde(default)]
    pub pubkey: Value,

    /// Requested validity in milliseconds
    #[serde(default)]
    pub duration: Value,
}

/// Issued certificate
#[derive(Debug, Serialize, Deserialize)]
pub struct CertifyResponse {
    /// Compact signed certificate
    pub cert: String,
    pub issuer: String,
    pub email: String,
    pub public_key: Value,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Tell the provisioning page which email is ready to be certified
///
/// GET /provision
pub async fn provision(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Response, ApiError> {
    let certify = state
        .service
        .certifiable_email(&session.id)
        .await?
        .unwrap_or_default();

    Ok((
        session.set_cookie(state.config.is_secure()),
        Json(ProvisionResponse { certify }),
    )
        .into_response())
}

/// Sign a certificate for a proven email
///
/// POST /provision/certify
///
/// The session's proof is spent by this call even when it fails, including
/// when the body is not a JSON object at all.
pub async fn certify(
    State(state): State<Arc<AppState>>,
    session: Session,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let parsed = body
        .map_err(|e| e.body_text())
        .and_then(|bytes| {
            serde_json::from_slice::<CertifyRequest>(&bytes).map_err(|e| e.to_string())
        });
    let request = match parsed {
        Ok(request) => request,
        Err(reason) => {
            state.service.discard_proof(&session.id).await?;
            return Err(ApiError::BadRequest(format!(
                "certify request must be a JSON object: {}",
                reason
            )));
        }
    };

    let email = request.email.as_str().unwrap_or_default();
    let certificate = state
        .service
        .certify(&session.id, email, &request.pubkey, &request.duration)
        .await?;

    Ok((
        session.set_cookie(state.config.is_secure()),
        Json(CertifyResponse {
            cert: certificate.encoded,
            issuer: certificate.issuer,
            email: certificate.email,
            public_key: certificate.public_key,
            issued_at: certificate.issued_at,
            expires_at: certificate.expires_at,
        }),
    )
        .into_response())
}
