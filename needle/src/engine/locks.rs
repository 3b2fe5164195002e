//! Per-owner serialization.

use crate::OwnerId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per owner with a pending or running event.
///
/// Entries are dropped once no task holds or waits for them, so the map only
/// grows with concurrently active owners.
#[derive(Debug, Default)]
pub(crate) struct OwnerLocks {
    locks: Mutex<HashMap<OwnerId, Arc<AsyncMutex<()>>>>,
}

impl OwnerLocks {
    /// Wait until no other event of `owner` is being processed.
    pub(crate) async fn acquire(&self, owner: OwnerId) -> OwnerGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(owner).or_default())
        };
        let guard = lock.lock_owned().await;
        OwnerGuard {
            locks: self,
            owner,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Held while an owner's event is processed.
#[derive(Debug)]
pub(crate) struct OwnerGuard<'a> {
    locks: &'a OwnerLocks,
    owner: OwnerId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self
            .locks
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Only the map holds the mutex: nobody is waiting.
        if locks
            .get(&self.owner)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.owner);
        }
    }
}
