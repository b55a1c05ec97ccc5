//! Signing Key Provider
//!
//! Owns the Ed25519 key pair that signs every certificate and whose public
//! half is published in the discovery document.
//!
//! The key is provisioned lazily, exactly once per process. Concurrent first
//! callers wait on the same in-flight initialization. A failed provisioning
//! is remembered and reported to every later caller; the binary awaits the
//! key before it starts listening, so a failure stops the service at boot.

use sideshow_core::{KeyPair, PublishedKey, TrustError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Where the signing key comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Fresh random key, lost on restart
    Ephemeral,
    /// Base64 seed file; a missing file falls back to an ephemeral key
    File(PathBuf),
}

/// Lazily provisioned signing key shared by all requests
#[derive(Debug)]
pub struct KeyProvider {
    source: KeySource,
    keys: OnceCell<Result<Arc<KeyPair>, TrustError>>,
    generations: AtomicUsize,
}

impl KeyProvider {
    pub fn new(source: KeySource) -> Self {
        Self {
            source,
            keys: OnceCell::new(),
            generations: AtomicUsize::new(0),
        }
    }

    pub fn ephemeral() -> Self {
        Self::new(KeySource::Ephemeral)
    }

    /// Provider that already holds `key_pair`
    pub fn with_key_pair(key_pair: KeyPair) -> Self {
        Self {
            source: KeySource::Ephemeral,
            keys: OnceCell::new_with(Some(Ok(Arc::new(key_pair)))),
            generations: AtomicUsize::new(0),
        }
    }

    pub fn source(&self) -> &KeySource {
        &self.source
    }

    /// Get the signing key, provisioning it on first use
    ///
    /// # Returns
    /// * `Ok(Arc<KeyPair>)` - The same key pair for every caller
    /// * `Err(TrustError::KeyProvisioning)` - If provisioning failed
    pub async fn get_keys(&self) -> Result<Arc<KeyPair>, TrustError> {
        self.keys
            .get_or_init(|| async { self.provision().await.map(Arc::new) })
            .await
            .clone()
    }

    /// Public half of the signing key in its published form
    pub async fn published_key(&self) -> Result<PublishedKey, TrustError> {
        Ok(self.get_keys().await?.public_key().published())
    }

    /// Whether a usable key has been provisioned
    pub fn is_ready(&self) -> bool {
        matches!(self.keys.get(), Some(Ok(_)))
    }

    /// How many times provisioning ran
    pub fn generation_count(&self) -> usize {
        self.generations.load(Ordering::SeqCst)
    }

    async fn provision(&self) -> Result<KeyPair, TrustError> {
        self.generations.fetch_add(1, Ordering::SeqCst);

        match &self.source {
            KeySource::Ephemeral => {
                info!("Generating ephemeral signing key");
                Ok(KeyPair::generate())
            }
            KeySource::File(path) => match tokio::fs::read_to_string(path).await {
                Ok(contents) => {
                    let key_pair = KeyPair::from_base64_seed(contents.trim()).map_err(|e| {
                        warn!(path = %path.display(), error = %e, "Unusable signing key file");
                        e
                    })?;
                    info!(path = %path.display(), "Loaded signing key");
                    Ok(key_pair)
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(
                        path = %path.display(),
                        "Signing key file not found, generating ephemeral key"
                    );
                    Ok(KeyPair::generate())
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not read signing key file");
                    Err(TrustError::KeyProvisioning(format!(
                        "cannot read {}: {}",
                        path.display(),
                        e
                    )))
                }
            },
        }
    }
}
