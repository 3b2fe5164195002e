//! JSON-file record store.
//!
//! One file per owner (`<data_dir>/<owner>.json`) holding that owner's
//! records. Files are read lazily and cached; every save rewrites the file
//! through a temporary file and a rename.

use crate::error::StorageResult;
use async_trait::async_trait;
use needle::OwnerId;
use needle::error::StoreResult;
use needle::record::{Record, RecordKind};
use needle::store::{RecordStore, apply_record};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Record store persisting each owner's records as a JSON array.
#[derive(Debug)]
pub struct JsonFileRecordStore {
    base_path: PathBuf,
    cache: RwLock<HashMap<OwnerId, Vec<Record>>>,
}

impl JsonFileRecordStore {
    /// Create a store rooted at `base_path`. The directory is created on the
    /// first save.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Directory holding the record files.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn owner_path(&self, owner: OwnerId) -> PathBuf {
        self.base_path.join(format!("{owner}.json"))
    }

    async fn read_file(&self, owner: OwnerId) -> StorageResult<Vec<Record>> {
        let path = self.owner_path(owner);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let records = serde_json::from_str(&content)?;
                debug!(owner = %owner, "loaded records from file");
                Ok(records)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file(&self, owner: OwnerId, records: &[Record]) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.base_path).await?;
        let path = self.owner_path(owner);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(records)?;
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load(&self, owner: OwnerId) -> StorageResult<Vec<Record>> {
        if let Some(records) = self.cache.read().await.get(&owner) {
            return Ok(records.clone());
        }
        let records = self.read_file(owner).await?;
        self.cache.write().await.insert(owner, records.clone());
        Ok(records)
    }

    async fn persist(&self, owner: OwnerId, record: Record) -> StorageResult<()> {
        let mut cache = self.cache.write().await;
        let mut records = match cache.get(&owner) {
            Some(records) => records.clone(),
            None => self.read_file(owner).await?,
        };
        apply_record(&mut records, record)?;
        self.write_file(owner, &records).await?;
        cache.insert(owner, records);
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonFileRecordStore {
    async fn save(&self, owner: OwnerId, record: Record) -> StoreResult<()> {
        let kind = record.kind();
        self.persist(owner, record).await?;
        debug!(owner = %owner, kind = %kind, "record saved to file");
        Ok(())
    }

    async fn list(&self, owner: OwnerId, kind: RecordKind) -> StoreResult<Vec<Record>> {
        Ok(self
            .load(owner)
            .await?
            .into_iter()
            .filter(|r| r.kind() == kind)
            .collect())
    }
}
