//! Session storage
//!
//! Each browser session owns one [`TrustState`]. The store hands it out by
//! session id; sessions that were never written, or that outlived the
//! session duration, read as empty.
//!
//! Certify consumes the proof through [`SessionStore::update`], which runs
//! the transition under the store's write lock so two concurrent requests
//! on one session cannot both observe the same proof.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use sideshow_core::TrustState;
use std::fmt::{self, Debug};

/// Error type for storage operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Session store lock poisoned")]
    Poisoned,
}

/// Opaque identifier of a browser session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random session id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A state transition applied atomically by [`SessionStore::update`]
pub type Transition<'a> = &'a (dyn Fn(&TrustState) -> TrustState + Send + Sync);

/// Storage backend trait for per-session trust state
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Current state of a session; unknown sessions are empty
    async fn load(&self, id: &SessionId) -> Result<TrustState, StorageError>;

    /// Replace the state of a session
    async fn save(&self, id: &SessionId, state: TrustState) -> Result<(), StorageError>;

    /// Apply `transition` as one read-modify-write step
    ///
    /// Returns `(previous, next)`.
    async fn update(
        &self,
        id: &SessionId,
        transition: Transition<'_>,
    ) -> Result<(TrustState, TrustState), StorageError>;
}
