//! Error types for the sideshow trust core

use thiserror::Error;

/// Result type alias using TrustError
pub type Result<T> = std::result::Result<T, TrustError>;

/// Errors that can surface from a trust transition or certificate issuance
///
/// Every kind stays distinguishable up to the HTTP boundary so it can be
/// mapped onto its own status code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrustError {
    /// Malformed or missing claim/certify parameters
    #[error("Invalid input: {0}")]
    Input(String),

    /// Proof absent or not matching the requested email at certify time
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// The federated provider rejected or failed the exchange
    #[error("Federated verification failed: {0}")]
    Adapter(String),

    /// The provider proved a different address than the one claimed
    #[error("Accounts do not match: claimed '{claimed}', proven '{proven}'")]
    Mismatch { claimed: String, proven: String },

    /// The signing key never became available
    #[error("Signing key unavailable: {0}")]
    KeyProvisioning(String),

    /// Signing this certificate failed
    #[error("Certificate signing failed: {0}")]
    Signing(String),
}

impl From<ed25519_dalek::SignatureError> for TrustError {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        TrustError::Signing(err.to_string())
    }
}

impl From<serde_json::Error> for TrustError {
    fn from(err: serde_json::Error) -> Self {
        TrustError::Signing(format!("serialization: {}", err))
    }
}
