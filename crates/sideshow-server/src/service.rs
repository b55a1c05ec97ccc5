//! Session-level trust flow
//!
//! Ties the pure [`TrustState`] transitions to their side effects: the
//! session store, the federated verifier, the key provider and the
//! certificate issuer. Every state change goes through
//! [`SessionStore::update`]; an error never alters the stored state.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use sideshow_bridge::{BridgeError, FederatedVerifier, Url};
use sideshow_core::cert::parse_duration;
use sideshow_core::{
    Certificate, CertificateIssuer, Completion, PublishedKey, TrustError, TrustState,
};

use crate::keys::KeyProvider;
use crate::storage::{SessionId, SessionStore, StorageError};

/// Errors surfaced by [`TrustService`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Trust(#[from] TrustError),

    /// The verifier could not produce a redirect to the provider
    #[error("Could not start verification: {0}")]
    Initiate(BridgeError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// The trust flow of every session
pub struct TrustService {
    store: Arc<dyn SessionStore>,
    verifier: Arc<dyn FederatedVerifier>,
    issuer: CertificateIssuer,
    keys: Arc<KeyProvider>,
}

impl TrustService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        verifier: Arc<dyn FederatedVerifier>,
        issuer: CertificateIssuer,
        keys: Arc<KeyProvider>,
    ) -> Self {
        Self {
            store,
            verifier,
            issuer,
            keys,
        }
    }

    pub fn issuer(&self) -> &CertificateIssuer {
        &self.issuer
    }

    pub fn keys(&self) -> &KeyProvider {
        &self.keys
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    /// Current trust state of a session
    pub async fn state(&self, session: &SessionId) -> Result<TrustState> {
        Ok(self.store.load(session).await?)
    }

    /// Record `email` as the session's claimed address
    pub async fn claim(&self, session: &SessionId, email: &str) -> Result<TrustState> {
        // Validate before touching the store
        TrustState::default().claim(email)?;
        let (_, next) = self
            .store
            .update(session, &|state: &TrustState| {
                state.claim(email).unwrap_or_else(|_| state.clone())
            })
            .await?;
        Ok(next)
    }

    /// Start federated verification of the session's current claim
    pub async fn begin_verification(&self, session: &SessionId) -> Result<Url> {
        let state = self.store.load(session).await?;
        let claimed = state.require_claim()?;
        self.verifier
            .initiate(claimed)
            .await
            .map_err(initiate_error)
    }

    /// Claim `email` and start verifying it
    ///
    /// The claim is only stored once the provider redirect exists, so a
    /// failed initiation leaves the session as it was.
    pub async fn claim_and_begin(&self, session: &SessionId, email: &str) -> Result<Url> {
        TrustState::default().claim(email)?;
        let url = self
            .verifier
            .initiate(email)
            .await
            .map_err(initiate_error)?;
        self.claim(session, email).await?;
        info!(session = %session, claimed = %email, "Verification started");
        Ok(url)
    }

    /// Feed the provider's callback parameters into the session
    pub async fn complete_verification(
        &self,
        session: &SessionId,
        params: &HashMap<String, String>,
    ) -> Result<Completion> {
        let outcome = self.verifier.verify(params).await;

        let (previous, _) = self
            .store
            .update(session, &|state: &TrustState| {
                state
                    .complete_verification(&outcome)
                    .map(|(next, _)| next)
                    .unwrap_or_else(|_| state.clone())
            })
            .await?;

        match previous.complete_verification(&outcome) {
            Ok((_, completion)) => {
                info!(session = %session, completion = %completion, "Verification completed");
                Ok(completion)
            }
            Err(e) => {
                warn!(session = %session, error = %e, "Verification did not prove the claim");
                Err(e.into())
            }
        }
    }

    /// The email the session may request a certificate for, if any
    pub async fn certifiable_email(&self, session: &SessionId) -> Result<Option<String>> {
        let state = self.store.load(session).await?;
        Ok(state.certifiable_email().map(str::to_string))
    }

    /// Issue a certificate for `email`
    ///
    /// Consumes the session's proof first, whatever happens afterwards.
    pub async fn certify(
        &self,
        session: &SessionId,
        email: &str,
        public_key: &Value,
        duration: &Value,
    ) -> Result<Certificate> {
        let (previous, _) = self
            .store
            .update(session, &|state: &TrustState| state.consume_proof(email).0)
            .await?;

        let (_, verdict) = previous.consume_proof(email);
        if let Err(e) = verdict {
            warn!(session = %session, requested = %email, error = %e, "Certify refused");
            return Err(e.into());
        }

        let requested_ms = parse_duration(duration)?;
        let keys = self.keys.get_keys().await?;
        let certificate = self
            .issuer
            .issue(keys.as_ref(), email, public_key, requested_ms)?;

        info!(
            session = %session,
            email = %certificate.email,
            expires_at = %certificate.expires_at,
            "Certificate issued"
        );
        Ok(certificate)
    }

    /// Spend the session's proof without issuing anything
    ///
    /// Used when a certify request is too malformed to carry an email.
    pub async fn discard_proof(&self, session: &SessionId) -> Result<()> {
        let (previous, _) = self
            .store
            .update(session, &|state: &TrustState| state.consume_proof("").0)
            .await?;
        if let Some(proven) = previous.proven() {
            warn!(session = %session, proven = %proven, "Proof discarded by malformed certify");
        }
        Ok(())
    }

    /// The signing key as published in the discovery document
    pub async fn published_key(&self) -> Result<PublishedKey> {
        Ok(self.keys.published_key().await?)
    }
}

fn initiate_error(err: BridgeError) -> ServiceError {
    match err {
        BridgeError::MissingEmail => TrustError::Input(err.to_string()).into(),
        other => ServiceError::Initiate(other),
    }
}
