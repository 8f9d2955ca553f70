//! Transaction records and durable snapshots
//!
//! A [`TransactionRecord`] is the server-shaped description of one
//! transfer: who sends, who receives, which files, and the canonical
//! status. The engine never invents records; it seeds them from account
//! service responses and merges later server copies into them.
//!
//! A [`TransactionSnapshot`] wraps a record with the local-only flags that
//! must survive a crash, and is what the snapshot store persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{DeviceId, TransactionId, UserId};
use super::status::{Role, TransactionStatus};

// ============================================================================
// TransactionKind
// ============================================================================

/// Whether a transaction targets a peer or produces a share link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Directed at one recipient account (possibly a ghost)
    Peer,
    /// Uploaded once, downloadable by anyone holding the URL
    Link,
}

// ============================================================================
// TransactionRecord
// ============================================================================

/// Server-shaped description of one transaction
///
/// Field ownership: everything here is server-authoritative and replaced
/// on merge, except `status`, which only moves along validated edges (the
/// machine owns that decision).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Stable id, doubling as map key and snapshot file name
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub sender_id: UserId,
    pub sender_device_id: DeviceId,
    /// Recipient account; `None` for links
    pub recipient_id: Option<UserId>,
    /// Unset until the recipient accepts on a concrete device
    pub recipient_device_id: Option<DeviceId>,
    pub status: TransactionStatus,
    /// File names as offered, relative paths
    pub files: Vec<String>,
    pub total_size: u64,
    /// True while the recipient is not a registered account
    pub is_ghost: bool,
    pub message: String,
    /// Download URL; links only
    pub share_link: Option<String>,
    /// Times the share link was followed; links only
    pub click_count: u32,
    pub ctime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
}

impl TransactionRecord {
    /// Creates a freshly offered peer transaction
    pub fn new_peer(
        id: TransactionId,
        sender_id: UserId,
        sender_device_id: DeviceId,
        recipient_id: UserId,
        files: Vec<String>,
        total_size: u64,
        message: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind: TransactionKind::Peer,
            sender_id,
            sender_device_id,
            recipient_id: Some(recipient_id),
            recipient_device_id: None,
            status: TransactionStatus::New,
            files,
            total_size,
            is_ghost: false,
            message: message.into(),
            share_link: None,
            click_count: 0,
            ctime: now,
            mtime: now,
        }
    }

    /// Creates a freshly generated link transaction
    pub fn new_link(
        id: TransactionId,
        sender_id: UserId,
        sender_device_id: DeviceId,
        files: Vec<String>,
        total_size: u64,
        message: impl Into<String>,
        share_link: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind: TransactionKind::Link,
            sender_id,
            sender_device_id,
            recipient_id: None,
            recipient_device_id: None,
            status: TransactionStatus::New,
            files,
            total_size,
            is_ghost: false,
            message: message.into(),
            share_link: Some(share_link.into()),
            click_count: 0,
            ctime: now,
            mtime: now,
        }
    }

    /// Which side of this transaction the given account plays
    ///
    /// Links have no recipient; the local account is always the sender
    /// there. For peer transactions an account that is neither side gets
    /// `Recipient`; the server never hands out such records.
    pub fn role_of(&self, me: UserId) -> Role {
        if self.sender_id == me {
            Role::Sender
        } else {
            Role::Recipient
        }
    }

    /// Returns true if this device is the one running the transfer
    ///
    /// For the sender that is the creating device; for the recipient it is
    /// the accepting device, unknown until acceptance.
    pub fn concerns_device(&self, me: UserId, device: DeviceId) -> bool {
        match self.role_of(me) {
            Role::Sender => self.sender_device_id == device,
            Role::Recipient => self.recipient_device_id == Some(device),
        }
    }

    /// Returns true if the transfer starts without recipient acceptance
    ///
    /// Links have no recipient to ask, and ghost offers are buffered to
    /// cloud storage immediately so the invitation can be redeemed later.
    pub fn starts_unattended(&self) -> bool {
        self.kind == TransactionKind::Link || self.is_ghost
    }

    /// Returns true if `user` is the remote side of this transaction
    pub fn peer_is(&self, me: UserId, user: UserId) -> bool {
        if self.sender_id == me {
            self.recipient_id == Some(user)
        } else {
            self.sender_id == user
        }
    }

    /// Copies the server-authoritative fields of `incoming`, except status
    ///
    /// Returns true if the recipient identity changed (a ghost recipient
    /// claimed by a registered account), which callers surface as a
    /// recipient-changed event.
    pub fn absorb(&mut self, incoming: &TransactionRecord) -> bool {
        debug_assert_eq!(self.id, incoming.id);
        let recipient_changed = self.recipient_id.is_some()
            && incoming.recipient_id.is_some()
            && self.recipient_id != incoming.recipient_id;
        self.recipient_id = incoming.recipient_id;
        self.recipient_device_id = incoming.recipient_device_id;
        self.is_ghost = incoming.is_ghost;
        self.share_link = incoming.share_link.clone();
        self.click_count = incoming.click_count;
        self.mtime = incoming.mtime;
        recipient_changed
    }
}

// ============================================================================
// TransactionSnapshot
// ============================================================================

/// What the snapshot store writes for one transaction
///
/// The record mirrors the last known server state; the extra fields are
/// local sub-state that must survive a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSnapshot {
    pub record: TransactionRecord,
    /// An outstanding pause request, replayed after a reconnect
    #[serde(default)]
    pub paused: bool,
    /// Human-readable cause for failed/canceled terminals
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl TransactionSnapshot {
    pub fn new(record: TransactionRecord) -> Self {
        Self {
            record,
            paused: false,
            failure_reason: None,
        }
    }
}
