//! The persisted ghost-code queue
//!
//! Invitation codes received while offline wait here for the next logged-in
//! flush. The backing file is rewritten wholesale after every enqueue and
//! after every consumption attempt, so the on-disk queue always matches the
//! in-memory one.

use std::path::{Path, PathBuf};

use tracing::debug;

use lnxsend_core::domain::ghost_code::GhostCode;
use lnxsend_core::domain::ids::UserId;

use crate::StoreError;

/// The durable invitation-code queue for one user
#[derive(Debug)]
pub struct GhostCodeQueue {
    path: PathBuf,
    codes: Vec<GhostCode>,
}

impl GhostCodeQueue {
    /// Opens (or initializes) the queue at `<home>/<user-id>/ghost_codes.json`
    pub async fn open(home: &Path, user: UserId) -> Result<Self, StoreError> {
        let path = home.join(user.to_string()).join("ghost_codes.json");
        let codes = match tokio::fs::read(&path).await {
            Ok(content) => serde_json::from_slice(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StoreError::ReadFailed(e.to_string())),
        };
        debug!(count = codes.len(), path = %path.display(), "Ghost-code queue opened");
        Ok(Self { path, codes })
    }

    /// The queued codes, oldest first
    pub fn codes(&self) -> &[GhostCode] {
        &self.codes
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Appends a code and rewrites the file
    ///
    /// A code already queued is not duplicated; the write still happens so
    /// the file timestamp reflects the attempt.
    pub async fn enqueue(&mut self, code: GhostCode) -> Result<(), StoreError> {
        if !self.codes.contains(&code) {
            self.codes.push(code);
        }
        self.persist().await
    }

    /// Drops a consumed code and rewrites the file
    pub async fn remove(&mut self, code: &GhostCode) -> Result<(), StoreError> {
        self.codes.retain(|c| c != code);
        self.persist().await
    }

    async fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::DirectoryFailed(e.to_string()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let payload = serde_json::to_vec_pretty(&self.codes)?;
        tokio::fs::write(&tmp, payload)
            .await
            .map_err(|e| StoreError::WriteFailed(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::WriteFailed(format!("{}: {e}", self.path.display())))?;
        Ok(())
    }
}
