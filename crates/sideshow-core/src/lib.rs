//! # Sideshow Core
//!
//! Trust logic for a service that lets a browser certificate-issuance
//! protocol (BrowserID) lean on a federated identity provider.
//!
//! Three inputs arrive independently and none is trusted on its own:
//!
//! - the email the user **claims**
//! - the email the identity provider **proves**
//! - the public key the client wants **certified**
//!
//! A certificate is signed only when all three agree, and each proof is
//! good for a single certify attempt.
//!
//! ## Modules
//!
//! - [`compare`]: email normalization and comparison
//! - [`trust`]: the per-session claimed/proven state machine
//! - [`cert`]: certificate issuance with duration clamping
//! - [`crypto`]: Ed25519 signing keys

pub mod cert;
pub mod compare;
pub mod crypto;
pub mod error;
pub mod trust;
pub mod types;

pub use cert::{Certificate, CertificateIssuer};
pub use compare::emails_match;
pub use crypto::{CertificateSigner, KeyPair, PublicKey, PublishedKey};
pub use error::{Result, TrustError};
pub use trust::TrustState;
pub use types::{Completion, VerificationOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
