//! Hand-off of finished records to storage and post-commit hooks.

use crate::OwnerId;
use crate::error::{CommitError, HookError};
use crate::record::{Record, RecordKind};
use crate::store::RecordStore;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Side effect run after a record is committed (goal checks, streaks, ...).
///
/// Hook failures are logged and never affect the dialog.
#[async_trait]
pub trait CommitHook: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Called once per successful commit of a flow that requests hooks.
    async fn on_record_committed(
        &self,
        owner: OwnerId,
        kind: RecordKind,
        record: &Record,
    ) -> Result<(), HookError>;
}

/// Saves records and runs hooks.
#[derive(Clone)]
pub struct CommitHandoff {
    store: Arc<dyn RecordStore>,
    hooks: Vec<Arc<dyn CommitHook>>,
}

impl fmt::Debug for CommitHandoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitHandoff")
            .field("hooks", &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl CommitHandoff {
    /// Create a hand-off to `store` without hooks.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            hooks: Vec::new(),
        }
    }

    /// Register a hook.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn CommitHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// The underlying record store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Save `record`. When `notify_hooks` is set, the returned [`PendingHooks`]
    /// runs every hook on the committed record.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError::Store`] if the store rejects the record.
    pub async fn commit(
        &self,
        owner: OwnerId,
        record: Record,
        notify_hooks: bool,
    ) -> Result<PendingHooks, CommitError> {
        let kind = record.kind();
        let for_hooks = (notify_hooks && !self.hooks.is_empty()).then(|| record.clone());

        self.store.save(owner, record).await?;
        debug!(owner = %owner, kind = %kind, "record committed");

        Ok(PendingHooks {
            owner,
            record: for_hooks,
            hooks: self.hooks.clone(),
        })
    }
}

/// Post-commit hooks waiting to run for one committed record.
#[must_use = "hooks do nothing unless run"]
pub struct PendingHooks {
    owner: OwnerId,
    record: Option<Record>,
    hooks: Vec<Arc<dyn CommitHook>>,
}

impl fmt::Debug for PendingHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingHooks")
            .field("owner", &self.owner)
            .field("armed", &self.record.is_some())
            .finish_non_exhaustive()
    }
}

impl PendingHooks {
    /// Run every hook. Failures are logged and never returned.
    pub async fn run(self) {
        let Some(record) = self.record else {
            return;
        };
        let kind = record.kind();
        for hook in &self.hooks {
            if let Err(e) = hook.on_record_committed(self.owner, kind, &record).await {
                warn!(owner = %self.owner, hook = hook.name(), error = %e, "commit hook failed");
            }
        }
    }
}
