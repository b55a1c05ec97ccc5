//! Error types for the verification bridge

use thiserror::Error;

/// Result type for verification bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while talking to the federated provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Verification was started without a claimed email
    #[error("No email was claimed")]
    MissingEmail,

    /// Provider identifier or endpoint is not a usable URL
    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    /// Provider discovery did not yield an OpenID endpoint
    #[error("Provider discovery failed: {0}")]
    Discovery(String),

    /// Network-level failure
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The response does not follow the protocol
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// A field that has to be covered by the provider's signature is not
    #[error("Field not signed by provider: {0}")]
    UnsignedField(String),

    /// The provider refused to vouch for the assertion
    #[error("Assertion rejected by provider: {0}")]
    Rejected(String),

    /// The assertion carries no email address
    #[error("Provider did not return an authenticated email")]
    NoEmail,
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        BridgeError::HttpError(err.to_string())
    }
}
