//! LNXSend Store - Durable per-user state
//!
//! File-backed persistence for:
//! - One snapshot file per transaction (crash recovery)
//! - The ghost-code queue
//!
//! ## Architecture
//!
//! This crate is a driven (secondary) adapter in the hexagonal
//! architecture. State lives under one directory per logged-in user:
//!
//! ```text
//! <home>/<user-id>/transactions/<transaction-id>.json
//! <home>/<user-id>/ghost_codes.json
//! ```
//!
//! Every write goes through a temp-file-then-atomic-rename, so a process
//! killed mid-write never leaves a half-written file behind; a reader sees
//! either the old or the new content.
//!
//! ## Key Components
//!
//! - [`SnapshotStore`] - Per-transaction snapshot files
//! - [`GhostCodeQueue`] - The persisted invitation-code queue
//! - [`StoreError`] - Error types for store operations

pub mod ghost_codes;
pub mod snapshots;

pub use ghost_codes::GhostCodeQueue;
pub use snapshots::SnapshotStore;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to create the backing directory
    #[error("Directory creation failed: {0}")]
    DirectoryFailed(String),

    /// A file write or rename failed
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// A file read failed
    #[error("Read failed: {0}")]
    ReadFailed(String),

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::SerializationError(e.to_string())
    }
}
