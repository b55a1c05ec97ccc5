//! Sideshow Server Binary
//!
//! Runs the BrowserID to OpenID bridge over HTTP.

use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sideshow_bridge::handlers::{OpenIdConfig, OpenIdVerifier};
use sideshow_bridge::{FederatedVerifier, LoggingVerifier};
use sideshow_core::CertificateIssuer;
use sideshow_server::{create_router, AppState, Config, KeyProvider, MemoryStore, TrustService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    // RUST_LOG takes precedence over SIDESHOW_LOG_LEVEL
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // The signing key must exist before any request is served
    let keys = Arc::new(KeyProvider::new(config.key_source()));
    if let Err(e) = keys.get_keys().await {
        error!(error = %e, "Could not provision signing key");
        return Err(e.into());
    }

    let openid = OpenIdVerifier::new(
        OpenIdConfig::new(config.provider.clone(), config.verify_url())
            .with_realm(config.public_url.clone())
            .with_timeout(config.provider_timeout),
    )?;
    let verifier: Arc<dyn FederatedVerifier> = Arc::new(LoggingVerifier::new(Arc::new(openid)));

    let issuer = CertificateIssuer::new(config.issuer.clone(), config.cert_max_duration);
    let service = TrustService::new(
        Arc::new(MemoryStore::with_ttl(config.session_duration)),
        verifier,
        issuer,
        keys,
    );

    info!(
        issuer = %config.issuer,
        provider = %config.provider,
        public_url = %config.public_url,
        max_cert_duration_ms = config.cert_max_duration.num_milliseconds(),
        session_duration_secs = config.session_duration.as_secs(),
        "Starting sideshow"
    );

    let addr = config.bind_addr();
    let state = Arc::new(AppState { service, config });
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Sideshow listening");

    axum::serve(listener, app).await?;

    Ok(())
}
