//! Authentication Handlers
//!
//! The browser is sent to the identity provider with a claimed email and
//! comes back to `/authenticate/verify` with the provider's assertion.

use axum::{
    extract::{Query, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use sideshow_core::Completion;

use crate::api::error::ApiError;
use crate::api::session::Session;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ForwardQuery {
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub success: bool,
}

/// Claim an email and redirect to the identity provider
///
/// GET /authenticate/forward?email=...
pub async fn forward(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<ForwardQuery>,
) -> Result<Response, ApiError> {
    let email = query
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("email is required".into()))?;

    let url = state.service.claim_and_begin(&session.id, &email).await?;
    debug!(session = %session.id, location = %url, "Forwarding to provider");

    Ok((
        StatusCode::FOUND,
        session.set_cookie(state.config.is_secure()),
        [(LOCATION, url.to_string())],
    )
        .into_response())
}

/// Return point from the identity provider
///
/// GET /authenticate/verify?openid.*
pub async fn verify(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let completion = state
        .service
        .complete_verification(&session.id, &params)
        .await?;

    Ok((
        session.set_cookie(state.config.is_secure()),
        Json(VerifyResponse {
            success: completion == Completion::Proven,
        }),
    )
        .into_response())
}
