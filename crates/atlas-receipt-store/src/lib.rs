// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! Receipt persistence and querying (spec §4.9).

use atlas_core::{Receipt, ReceiptStatus};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

const MIGRATION_001: &str = "001_create_receipts";

/// Errors a [`ReceiptStore`] operation can raise.
#[derive(Debug, thiserror::Error)]
pub enum ReceiptStoreError {
    /// A filesystem operation failed.
    #[error("receipt store io error: {0}")]
    Io(#[from] std::io::Error),
    /// A receipt could not be (de)serialized.
    #[error("receipt store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// The requested receipt id has no record.
    #[error("receipt not found: {0}")]
    NotFound(Uuid),
    /// `create` was called with an id that already exists.
    #[error("receipt already exists: {0}")]
    AlreadyExists(Uuid),
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Default)]
struct MigrationLedger {
    applied: Vec<String>,
}

/// Persistent, queryable storage for [`Receipt`]s.
///
/// Backed by one JSON file per receipt under `<data_dir>/receipts/`, with
/// an in-memory index (rebuilt from disk at [`ReceiptStore::open`]) backing
/// `list`/`count`/`get_by_status` so those don't re-walk the directory on
/// every call. A `_migrations.json` ledger under `data_dir` records applied
/// schema migrations idempotently, standing in for the `_migrations` table
/// spec §4.9 describes (see the workspace `DESIGN.md`).
pub struct ReceiptStore {
    receipts_dir: PathBuf,
    migrations_path: PathBuf,
    index: RwLock<BTreeMap<Uuid, Receipt>>,
}

impl ReceiptStore {
    /// Open (creating if necessary) a receipt store rooted at `data_dir`,
    /// running migrations and hydrating the in-memory index from any
    /// receipts already on disk.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, ReceiptStoreError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let receipts_dir = data_dir.join("receipts");
        let migrations_path = data_dir.join("_migrations.json");

        tokio::fs::create_dir_all(&receipts_dir).await?;
        run_migrations(&migrations_path).await?;

        let store = Self {
            receipts_dir,
            migrations_path,
            index: RwLock::new(BTreeMap::new()),
        };
        store.hydrate().await?;
        Ok(store)
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.receipts_dir.join(format!("{id}.json"))
    }

    async fn hydrate(&self) -> Result<(), ReceiptStoreError> {
        let mut entries = tokio::fs::read_dir(&self.receipts_dir).await?;
        let mut loaded = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = match tokio::fs::read(&path).await {
                Ok(b) => b,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to read receipt file during hydration");
                    continue;
                }
            };
            match serde_json::from_slice::<Receipt>(&bytes) {
                Ok(receipt) => {
                    self.index.write().await.insert(receipt.receipt_id, receipt);
                    loaded += 1;
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to parse receipt file during hydration");
                }
            }
        }
        info!(count = loaded, "hydrated receipts from disk");
        Ok(())
    }

    async fn persist(&self, receipt: &Receipt) -> Result<(), ReceiptStoreError> {
        let bytes = serde_json::to_vec_pretty(receipt)?;
        tokio::fs::write(self.path_for(receipt.receipt_id), bytes).await?;
        Ok(())
    }

    /// Insert a new receipt. Fails if a receipt with the same id already
    /// exists — receipts are identified by their client-generated UUID
    /// (spec §4.9), so `create` is not an upsert.
    pub async fn create(&self, receipt: Receipt) -> Result<(), ReceiptStoreError> {
        {
            let guard = self.index.read().await;
            if guard.contains_key(&receipt.receipt_id) {
                return Err(ReceiptStoreError::AlreadyExists(receipt.receipt_id));
            }
        }
        self.persist(&receipt).await?;
        self.index.write().await.insert(receipt.receipt_id, receipt);
        Ok(())
    }

    /// Fetch a receipt by id.
    pub async fn get(&self, id: Uuid) -> Option<Receipt> {
        self.index.read().await.get(&id).cloned()
    }

    /// Newest-first page of receipts, optionally filtered by status.
    pub async fn list(&self, limit: usize, offset: usize, status: Option<ReceiptStatus>) -> Vec<Receipt> {
        let mut all: Vec<Receipt> = self
            .index
            .read()
            .await
            .values()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        all.sort_by(|a, b| b.timestamp_utc.cmp(&a.timestamp_utc).then_with(|| b.receipt_id.cmp(&a.receipt_id)));
        all.into_iter().skip(offset).take(limit).collect()
    }

    /// Total count of stored receipts, optionally filtered by status.
    pub async fn count(&self, status: Option<ReceiptStatus>) -> usize {
        self.index.read().await.values().filter(|r| status.is_none_or(|s| r.status == s)).count()
    }

    /// Overwrite a stored receipt's status and blob by id. The receipt must
    /// already exist.
    pub async fn update(&self, receipt: Receipt) -> Result<(), ReceiptStoreError> {
        {
            let guard = self.index.read().await;
            if !guard.contains_key(&receipt.receipt_id) {
                return Err(ReceiptStoreError::NotFound(receipt.receipt_id));
            }
        }
        self.persist(&receipt).await?;
        self.index.write().await.insert(receipt.receipt_id, receipt);
        Ok(())
    }

    /// Delete a receipt by id. Returns `true` if one was removed.
    pub async fn delete(&self, id: Uuid) -> Result<bool, ReceiptStoreError> {
        let removed = self.index.write().await.remove(&id).is_some();
        if removed {
            match tokio::fs::remove_file(self.path_for(id)).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(removed)
    }

    /// Receipts opened within the last `hours` hours, newest-first,
    /// capped at `limit`.
    pub async fn get_recent(&self, hours: i64, limit: usize) -> Vec<Receipt> {
        let cutoff = chrono::Utc::now() - chrono::Duration::hours(hours);
        let mut recent: Vec<Receipt> =
            self.index.read().await.values().filter(|r| r.timestamp_utc >= cutoff).cloned().collect();
        recent.sort_by(|a, b| b.timestamp_utc.cmp(&a.timestamp_utc));
        recent.into_iter().take(limit).collect()
    }

    /// Every receipt with the given status, newest-first.
    pub async fn get_by_status(&self, status: ReceiptStatus) -> Vec<Receipt> {
        self.list(usize::MAX, 0, Some(status)).await
    }

    /// The migrations ledger file path, exposed for introspection/tests.
    pub fn migrations_path(&self) -> &Path {
        &self.migrations_path
    }
}

async fn run_migrations(migrations_path: &Path) -> Result<(), ReceiptStoreError> {
    let mut ledger = match tokio::fs::read(migrations_path).await {
        Ok(bytes) => serde_json::from_slice::<MigrationLedger>(&bytes).unwrap_or_default(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => MigrationLedger::default(),
        Err(err) => return Err(err.into()),
    };

    let mut changed = false;
    for name in [MIGRATION_001] {
        if !ledger.applied.iter().any(|a| a == name) {
            ledger.applied.push(name.to_string());
            changed = true;
            info!(migration = name, "applied receipt store migration");
        }
    }

    if changed {
        let bytes = serde_json::to_vec_pretty(&ledger)?;
        tokio::fs::write(migrations_path, bytes).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::{Intent, IntentType, ReceiptStatus};

    fn sample_receipt() -> Receipt {
        Receipt::open("buy milk", None)
    }

    #[tokio::test]
    async fn open_creates_directories_and_migration_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReceiptStore::open(dir.path()).await.unwrap();
        assert!(store.migrations_path().exists());
        assert!(dir.path().join("receipts").is_dir());
    }

    #[tokio::test]
    async fn migrations_are_idempotent_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        ReceiptStore::open(dir.path()).await.unwrap();
        let bytes_first = tokio::fs::read(dir.path().join("_migrations.json")).await.unwrap();
        ReceiptStore::open(dir.path()).await.unwrap();
        let bytes_second = tokio::fs::read(dir.path().join("_migrations.json")).await.unwrap();
        assert_eq!(bytes_first, bytes_second);
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReceiptStore::open(dir.path()).await.unwrap();
        let receipt = sample_receipt();
        let id = receipt.receipt_id;
        store.create(receipt.clone()).await.unwrap();
        let fetched = store.get(id).await.unwrap();
        assert_eq!(fetched.receipt_id, id);
        assert_eq!(fetched.user_input, "buy milk");
    }

    #[tokio::test]
    async fn create_with_duplicate_id_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReceiptStore::open(dir.path()).await.unwrap();
        let receipt = sample_receipt();
        store.create(receipt.clone()).await.unwrap();
        let err = store.create(receipt).await.unwrap_err();
        assert!(matches!(err, ReceiptStoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn update_of_unknown_receipt_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReceiptStore::open(dir.path()).await.unwrap();
        let err = store.update(sample_receipt()).await.unwrap_err();
        assert!(matches!(err, ReceiptStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_overwrites_status_and_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReceiptStore::open(dir.path()).await.unwrap();
        let mut receipt = sample_receipt();
        let id = receipt.receipt_id;
        store.create(receipt.clone()).await.unwrap();

        receipt.status = ReceiptStatus::Success;
        receipt.intent_final = Some(Intent::new(IntentType::CaptureTasks, 0.9, Default::default(), vec![]));
        store.update(receipt).await.unwrap();

        let fetched = store.get(id).await.unwrap();
        assert_eq!(fetched.status, ReceiptStatus::Success);
        assert!(fetched.intent_final.is_some());
    }

    #[tokio::test]
    async fn delete_removes_from_index_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReceiptStore::open(dir.path()).await.unwrap();
        let receipt = sample_receipt();
        let id = receipt.receipt_id;
        store.create(receipt).await.unwrap();

        assert!(store.delete(id).await.unwrap());
        assert!(store.get(id).await.is_none());
        assert!(!store.delete(id).await.unwrap());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_respects_limit_offset() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReceiptStore::open(dir.path()).await.unwrap();

        let mut ids = Vec::new();
        for i in 0..3 {
            let mut r = sample_receipt();
            r.timestamp_utc = chrono::Utc::now() + chrono::Duration::seconds(i);
            ids.push(r.receipt_id);
            store.create(r).await.unwrap();
        }

        let page = store.list(2, 0, None).await;
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].receipt_id, ids[2]);
        assert_eq!(page[1].receipt_id, ids[1]);

        let rest = store.list(2, 2, None).await;
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].receipt_id, ids[0]);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReceiptStore::open(dir.path()).await.unwrap();

        let mut ok = sample_receipt();
        ok.status = ReceiptStatus::Success;
        store.create(ok).await.unwrap();

        let mut failed = sample_receipt();
        failed.status = ReceiptStatus::Failed;
        store.create(failed).await.unwrap();

        let only_failed = store.list(10, 0, Some(ReceiptStatus::Failed)).await;
        assert_eq!(only_failed.len(), 1);
        assert_eq!(only_failed[0].status, ReceiptStatus::Failed);

        assert_eq!(store.count(None).await, 2);
        assert_eq!(store.count(Some(ReceiptStatus::Success)).await, 1);
    }

    #[tokio::test]
    async fn get_by_status_matches_list_filter() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReceiptStore::open(dir.path()).await.unwrap();
        let mut pending = sample_receipt();
        pending.status = ReceiptStatus::PendingConfirm;
        store.create(pending.clone()).await.unwrap();

        let found = store.get_by_status(ReceiptStatus::PendingConfirm).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].receipt_id, pending.receipt_id);
    }

    #[tokio::test]
    async fn get_recent_excludes_old_receipts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReceiptStore::open(dir.path()).await.unwrap();

        let mut old = sample_receipt();
        old.timestamp_utc = chrono::Utc::now() - chrono::Duration::hours(48);
        store.create(old).await.unwrap();

        let recent = sample_receipt();
        let recent_id = recent.receipt_id;
        store.create(recent).await.unwrap();

        let found = store.get_recent(24, 10).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].receipt_id, recent_id);
    }

    #[tokio::test]
    async fn reopening_store_rehydrates_existing_receipts_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let id;
        {
            let store = ReceiptStore::open(dir.path()).await.unwrap();
            let receipt = sample_receipt();
            id = receipt.receipt_id;
            store.create(receipt).await.unwrap();
        }

        let reopened = ReceiptStore::open(dir.path()).await.unwrap();
        assert!(reopened.get(id).await.is_some());
        assert_eq!(reopened.count(None).await, 1);
    }
}
