//! Federated verifier seam
//!
//! The trust state machine only ever sees this two-operation interface, so
//! the concrete protocol can be swapped without touching it.

use async_trait::async_trait;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use sideshow_core::VerificationOutcome;

use crate::error::Result;

/// Trait for federated identity verifiers
///
/// `initiate` produces the URL the browser is sent to; `verify` inspects the
/// parameters the provider sends the browser back with. No state is kept
/// between the two calls.
#[async_trait]
pub trait FederatedVerifier: Send + Sync {
    /// Start verification of `claimed_email`
    ///
    /// # Returns
    /// * `Ok(Url)` - Where to redirect the user
    /// * `Err(BridgeError)` - If the email is missing or the provider is unusable
    async fn initiate(&self, claimed_email: &str) -> Result<Url>;

    /// Check the provider's response
    ///
    /// # Arguments
    /// * `params` - Query parameters of the callback request
    async fn verify(&self, params: &HashMap<String, String>) -> VerificationOutcome;

    /// Get a description of this verifier (for logging)
    fn description(&self) -> &str {
        "federated verifier"
    }
}

/// Logs every exchange passing through the wrapped verifier
pub struct LoggingVerifier {
    inner: Arc<dyn FederatedVerifier>,
}

impl LoggingVerifier {
    pub fn new(inner: Arc<dyn FederatedVerifier>) -> Self {
        info!(verifier = inner.description(), "Registered federated verifier");
        Self { inner }
    }
}

#[async_trait]
impl FederatedVerifier for LoggingVerifier {
    async fn initiate(&self, claimed_email: &str) -> Result<Url> {
        let result = self.inner.initiate(claimed_email).await;
        match &result {
            Ok(url) => {
                info!(
                    verifier = self.inner.description(),
                    claimed = %claimed_email,
                    host = url.host_str().unwrap_or_default(),
                    "Redirecting to identity provider"
                );
            }
            Err(e) => {
                warn!(
                    verifier = self.inner.description(),
                    claimed = %claimed_email,
                    error = %e,
                    "Could not start federated verification"
                );
            }
        }
        result
    }

    async fn verify(&self, params: &HashMap<String, String>) -> VerificationOutcome {
        let outcome = self.inner.verify(params).await;
        match &outcome {
            VerificationOutcome::Verified { email } => {
                info!(verifier = self.inner.description(), email = %email, "Assertion verified");
            }
            VerificationOutcome::Cancelled => {
                info!(verifier = self.inner.description(), "User cancelled at provider");
            }
            VerificationOutcome::Failed { reason } => {
                warn!(verifier = self.inner.description(), reason = %reason, "Assertion rejected");
            }
        }
        outcome
    }

    fn description(&self) -> &str {
        self.inner.description()
    }
}
