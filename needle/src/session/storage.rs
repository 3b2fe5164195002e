//! Session store backends.

use super::Session;
use crate::OwnerId;
use crate::error::StoreResult;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Mapping from owner to at most one active session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the owner's session.
    async fn get(&self, owner: OwnerId) -> StoreResult<Option<Session>>;

    /// Store a session, overwriting any existing one for the same owner.
    async fn put(&self, session: Session) -> StoreResult<()>;

    /// Remove the owner's session. Removing an absent session is not an error.
    async fn remove(&self, owner: OwnerId) -> StoreResult<()>;

    /// Number of active sessions.
    async fn len(&self) -> StoreResult<usize>;

    /// Whether the owner has a session.
    async fn contains(&self, owner: OwnerId) -> StoreResult<bool> {
        Ok(self.get(owner).await?.is_some())
    }
}

/// In-memory session store.
///
/// Sessions do not survive a restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<OwnerId, Session>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, owner: OwnerId) -> StoreResult<Option<Session>> {
        Ok(self.sessions.read().await.get(&owner).cloned())
    }

    async fn put(&self, session: Session) -> StoreResult<()> {
        self.sessions.write().await.insert(session.owner, session);
        Ok(())
    }

    async fn remove(&self, owner: OwnerId) -> StoreResult<()> {
        self.sessions.write().await.remove(&owner);
        Ok(())
    }

    async fn len(&self) -> StoreResult<usize> {
        Ok(self.sessions.read().await.len())
    }
}
