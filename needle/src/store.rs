//! Persistence collaborator for committed records.

use crate::OwnerId;
use crate::error::{StoreError, StoreResult};
use crate::record::{Record, RecordKind};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

/// Record storage keyed by owner and record kind.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a record for `owner`. The store takes ownership.
    ///
    /// Implementations apply the record with [`apply_record`] semantics:
    /// entries merge, removals delete, photo updates modify a project.
    async fn save(&self, owner: OwnerId, record: Record) -> StoreResult<()>;

    /// All stored records of `kind` for `owner`, in insertion order.
    async fn list(&self, owner: OwnerId, kind: RecordKind) -> StoreResult<Vec<Record>>;
}

/// Apply a committed record to one owner's record list.
///
/// - an entry whose date and hashtag match an existing entry adds to its count
/// - an [`EntryRemoval`](crate::record::EntryRemoval) deletes every entry on that date
/// - a [`ProjectPhoto`](crate::record::ProjectPhoto) replaces the photo of an
///   existing project, or fails with [`StoreError::NotFound`]
/// - anything else is appended
pub fn apply_record(records: &mut Vec<Record>, record: Record) -> StoreResult<()> {
    match record {
        Record::Entry(entry) => {
            let existing = records.iter_mut().find_map(|r| match r {
                Record::Entry(e) if e.date == entry.date && e.hashtag == entry.hashtag => Some(e),
                _ => None,
            });
            match existing {
                Some(e) => e.count += entry.count,
                None => records.push(Record::Entry(entry)),
            }
        }
        Record::EntryRemoval(removal) => {
            records.retain(|r| !matches!(r, Record::Entry(e) if e.date == removal.date));
        }
        Record::ProjectPhoto(update) => {
            let project = records.iter_mut().find_map(|r| match r {
                Record::Project(p) if p.id == update.project_id => Some(p),
                _ => None,
            });
            match project {
                Some(p) => p.photo = Some(update.photo),
                None => return Err(StoreError::not_found(update.project_id)),
            }
        }
        other => records.push(other),
    }
    Ok(())
}

/// Distinct hashtags of the owner's entries and projects, sorted.
pub async fn known_hashtags(store: &dyn RecordStore, owner: OwnerId) -> StoreResult<Vec<String>> {
    let mut tags = BTreeSet::new();
    for record in store.list(owner, RecordKind::Entry).await? {
        if let Record::Entry(e) = record
            && let Some(tag) = e.hashtag
        {
            tags.insert(tag);
        }
    }
    for record in store.list(owner, RecordKind::Project).await? {
        if let Record::Project(p) = record
            && let Some(tag) = p.hashtag
        {
            tags.insert(tag);
        }
    }
    Ok(tags.into_iter().collect())
}

/// In-memory record store.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<OwnerId, Vec<Record>>>,
}

impl MemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn save(&self, owner: OwnerId, record: Record) -> StoreResult<()> {
        let kind = record.kind();
        let mut records = self.records.write().await;
        apply_record(records.entry(owner).or_default(), record)?;
        debug!(owner = %owner, kind = %kind, "record saved");
        Ok(())
    }

    async fn list(&self, owner: OwnerId, kind: RecordKind) -> StoreResult<Vec<Record>> {
        Ok(self
            .records
            .read()
            .await
            .get(&owner)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.kind() == kind)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
