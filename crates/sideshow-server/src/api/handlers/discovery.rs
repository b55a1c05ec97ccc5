//! Liveness and BrowserID discovery

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use sideshow_core::PublishedKey;

use crate::api::error::ApiError;

use super::AppState;

/// Document served at `/.well-known/browserid`
#[derive(Debug, Serialize, Deserialize)]
pub struct SupportDocument {
    #[serde(rename = "public-key")]
    pub public_key: PublishedKey,
    pub authentication: String,
    pub provisioning: String,
}

/// Liveness check
///
/// GET /__heartbeat__
pub async fn heartbeat() -> &'static str {
    "ok"
}

/// Advertise the signing key and the flow entry points
///
/// GET /.well-known/browserid
pub async fn support_document(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SupportDocument>, ApiError> {
    let public_key = state.service.published_key().await?;

    Ok(Json(SupportDocument {
        public_key,
        authentication: "/authenticate".into(),
        provisioning: "/provision".into(),
    }))
}
