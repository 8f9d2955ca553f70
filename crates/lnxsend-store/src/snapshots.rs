//! Per-transaction snapshot files
//!
//! One JSON file per transaction, named by its id, under the per-user
//! `transactions/` directory. Files are rewritten wholesale on every
//! accepted status change and loaded wholesale at login, before the first
//! resync.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use lnxsend_core::domain::ids::{TransactionId, UserId};
use lnxsend_core::domain::transaction::TransactionSnapshot;

use crate::StoreError;

/// Durable, atomic storage for transaction snapshots
///
/// Each snapshot file is owned exclusively by its transaction machine;
/// the store itself keeps no cache and no locks.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    directory: PathBuf,
}

impl SnapshotStore {
    /// Creates a store rooted at `<home>/<user-id>/transactions`
    pub fn new(home: &Path, user: UserId) -> Self {
        Self {
            directory: home.join(user.to_string()).join("transactions"),
        }
    }

    /// The directory snapshot files live in
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_path(&self, id: TransactionId) -> PathBuf {
        self.directory.join(format!("{id}.json"))
    }

    /// Writes one snapshot via temp-file-then-atomic-rename
    pub async fn save(&self, snapshot: &TransactionSnapshot) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| StoreError::DirectoryFailed(e.to_string()))?;

        let id = snapshot.record.id;
        let path = self.file_path(id);
        let tmp = self.directory.join(format!("{id}.json.tmp"));
        let payload = serde_json::to_vec_pretty(snapshot)?;

        tokio::fs::write(&tmp, payload)
            .await
            .map_err(|e| StoreError::WriteFailed(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::WriteFailed(format!("{}: {e}", path.display())))?;

        debug!(transaction_id = %id, path = %path.display(), "Snapshot written");
        Ok(())
    }

    /// Loads every snapshot in the directory
    ///
    /// Unparsable files are skipped with a warning rather than failing the
    /// whole load; one corrupt snapshot must not block a login.
    pub async fn load_all(&self) -> Result<Vec<TransactionSnapshot>, StoreError> {
        let mut snapshots = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            // A fresh user has no directory yet.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(snapshots),
            Err(e) => return Err(StoreError::ReadFailed(e.to_string())),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = match tokio::fs::read(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable snapshot");
                    continue;
                }
            };
            match serde_json::from_slice::<TransactionSnapshot>(&content) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping corrupt snapshot");
                }
            }
        }

        debug!(count = snapshots.len(), "Snapshots loaded");
        Ok(snapshots)
    }

    /// Deletes one snapshot file; missing files are fine
    pub async fn remove(&self, id: TransactionId) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.file_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::WriteFailed(e.to_string())),
        }
    }
}
