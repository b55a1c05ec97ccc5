//! Mock Verifier
//!
//! For testing purposes - answers from the callback parameters instead of a
//! real provider.

use async_trait::async_trait;
use reqwest::Url;
use std::collections::HashMap;

use sideshow_core::compare::normalize;
use sideshow_core::VerificationOutcome;

use crate::error::{BridgeError, Result};
use crate::verifier::FederatedVerifier;

/// Mock verifier for testing
///
/// `initiate` redirects to `https://provider.mock/auth?email=<claimed>`.
/// `verify` reads the callback parameters:
/// - `openid.mode=cancel` - the user cancelled
/// - `mock.error=<message>` - verification failed with that message
/// - `mock.email=<address>` - the provider vouches for that address
pub struct MockVerifier {
    initiate_error: Option<BridgeError>,
}

impl MockVerifier {
    /// Create a new mock verifier
    pub fn new() -> Self {
        Self {
            initiate_error: None,
        }
    }

    /// Make every `initiate` call fail with `error`
    pub fn failing_initiate(error: BridgeError) -> Self {
        Self {
            initiate_error: Some(error),
        }
    }
}

impl Default for MockVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FederatedVerifier for MockVerifier {
    fn description(&self) -> &str {
        "mock verifier"
    }

    async fn initiate(&self, claimed_email: &str) -> Result<Url> {
        if normalize(claimed_email).is_none() {
            return Err(BridgeError::MissingEmail);
        }
        if let Some(error) = &self.initiate_error {
            return Err(error.clone());
        }
        let mut url = Url::parse("https://provider.mock/auth")
            .map_err(|e| BridgeError::InvalidProvider(e.to_string()))?;
        url.query_pairs_mut().append_pair("email", claimed_email);
        Ok(url)
    }

    async fn verify(&self, params: &HashMap<String, String>) -> VerificationOutcome {
        if params.get("openid.mode").map(String::as_str) == Some("cancel") {
            return VerificationOutcome::Cancelled;
        }
        if let Some(message) = params.get("mock.error") {
            return VerificationOutcome::failed(message.clone());
        }
        match params.get("mock.email") {
            Some(email) if !email.is_empty() => VerificationOutcome::verified(email.clone()),
            _ => VerificationOutcome::failed(BridgeError::NoEmail.to_string()),
        }
    }
}
