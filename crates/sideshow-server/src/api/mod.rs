//! API module for the sideshow server

pub mod error;
pub mod handlers;
pub mod session;

use axum::{
    http::{header::STRICT_TRANSPORT_SECURITY, HeaderValue},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use handlers::AppState;

/// HSTS policy sent when the service is reached over https
pub const HSTS_POLICY: &str = "max-age=1088640; includeSubdomains";

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let secure = state.config.is_secure();

    let router = Router::new()
        // Health endpoint
        .route("/__heartbeat__", get(handlers::heartbeat))
        // Discovery
        .route("/.well-known/browserid", get(handlers::support_document))
        // Authentication endpoints
        .route("/authenticate/forward", get(handlers::forward))
        .route("/authenticate/verify", get(handlers::verify))
        // Provisioning endpoints
        .route("/provision", get(handlers::provision))
        .route("/provision/certify", post(handlers::certify))
        // Middleware
        .layer(TraceLayer::new_for_http());

    let router = if secure {
        router.layer(SetResponseHeaderLayer::overriding(
            STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS_POLICY),
        ))
    } else {
        router
    };

    router.with_state(state)
}
