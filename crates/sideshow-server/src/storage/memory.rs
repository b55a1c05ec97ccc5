//! In-memory session storage
//!
//! Default backend. Sessions do not survive a restart, which only costs
//! users a fresh verification round-trip. Entries expire once they have
//! gone unwritten for the session duration.

use async_trait::async_trait;
use moka::sync::Cache;
use sideshow_core::TrustState;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use super::{SessionId, SessionStore, StorageError, Transition};

/// Default lifetime of a session (24 hours)
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// In-memory implementation of SessionStore
#[derive(Debug)]
pub struct MemoryStore {
    sessions: Cache<SessionId, TrustState>,
    /// Serializes writers so `update` is one read-modify-write step
    write_lock: Mutex<()>,
}

impl MemoryStore {
    /// Create a new empty memory store with the default session lifetime
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }

    /// Create a store whose sessions expire `ttl` after their last write
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Cache::builder().time_to_live(ttl).build(),
            write_lock: Mutex::new(()),
        }
    }

    /// Empty states are not kept around
    fn store_state(&self, id: &SessionId, state: TrustState) {
        if state == TrustState::Empty {
            self.sessions.invalidate(id);
        } else {
            self.sessions.insert(id.clone(), state);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, id: &SessionId) -> Result<TrustState, StorageError> {
        Ok(self.sessions.get(id).unwrap_or_default())
    }

    async fn save(&self, id: &SessionId, state: TrustState) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
        debug!(session = %id, state = state.name(), "Saving session");
        self.store_state(id, state);
        Ok(())
    }

    async fn update(
        &self,
        id: &SessionId,
        transition: Transition<'_>,
    ) -> Result<(TrustState, TrustState), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
        let previous = self.sessions.get(id).unwrap_or_default();
        let next = transition(&previous);
        debug!(
            session = %id,
            from = previous.name(),
            to = next.name(),
            "Updating session"
        );
        self.store_state(id, next.clone());
        Ok((previous, next))
    }
}
