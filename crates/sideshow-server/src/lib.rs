//! Sideshow Server
//!
//! Lets BrowserID clients obtain certificates for email addresses that a
//! federated OpenID provider vouches for:
//! - Records the email the user claims
//! - Sends the user to the provider and checks the returned assertion
//! - Signs one certificate per successful verification
//!
//! ## API Endpoints
//!
//! - `GET /__heartbeat__` - Liveness check
//! - `GET /.well-known/browserid` - Signing key and flow entry points
//! - `GET /authenticate/forward?email=` - Claim an email, redirect to the provider
//! - `GET /authenticate/verify` - Provider callback
//! - `GET /provision` - Email ready to be certified
//! - `POST /provision/certify` - Issue a certificate

pub mod api;
pub mod config;
pub mod keys;
pub mod service;
pub mod storage;

pub use api::create_router;
pub use api::handlers::AppState;
pub use config::{Config, ConfigError};
pub use keys::{KeyProvider, KeySource};
pub use service::{ServiceError, TrustService};
pub use storage::{MemoryStore, SessionId, SessionStore, StorageError};
