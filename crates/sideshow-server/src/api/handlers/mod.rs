//! API request handlers

pub mod authenticate;
pub mod discovery;
pub mod provision;

pub use authenticate::{forward, verify, ForwardQuery, VerifyResponse};
pub use discovery::{heartbeat, support_document, SupportDocument};
pub use provision::{certify, provision, CertifyRequest, CertifyResponse, ProvisionResponse};

use crate::config::Config;
use crate::service::TrustService;

/// Application state shared across handlers
pub struct AppState {
    /// Trust flow of every session
    pub service: TrustService,
    /// Service configuration
    pub config: Config,
}
