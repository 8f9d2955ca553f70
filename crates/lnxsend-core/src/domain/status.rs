//! Transaction status state machine
//!
//! This module defines the canonical status lifecycle shared by peer and
//! link transactions, together with the per-role final sets and the edge
//! table every status change is validated against.
//!
//! ## State Machine
//!
//! ```text
//!     ┌───────┐  peer offer   ┌───────────────┐  accepted   ┌──────────────┐
//!     │  New  │ ────────────► │ WaitingAccept │ ──────────► │ WaitingData  │
//!     └───────┘               └───────────────┘             └──────────────┘
//!         │                           │                            │
//!         │ ghost recipient           │ accepted elsewhere         │
//!         │                           ▼                            ▼
//!         │                   ┌───────────────┐   pause    ┌──────────────┐
//!         │                   │ OnOtherDevice │     ┌────► │  Connecting  │
//!         │                   └───────────────┘     │      └──────────────┘
//!         │                                         │          ▲      │
//!         ▼                                     ┌────────┐     │      ▼
//!     ┌───────────────┐   ghost claimed         │ Paused │ ◄── │ Transferring
//!     │ CloudBuffered │ ──────────────────►     └────────┘     └──────────┘
//!     └───────────────┘   (resume to Connecting/Transferring)
//!
//!     Every non-final status may additionally reach the five common
//!     terminals: Finished, Failed, Canceled, Rejected, Deleted.
//!     PaymentRequired stops reconciliation but may still be Canceled.
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// TransactionStatus enum
// ============================================================================

/// Status of a transaction in its lifecycle
///
/// Statuses are server-authoritative: the account service reports the
/// canonical value and local operations request changes against it. The
/// engine only ever moves along the edges in [`can_transition_to`].
///
/// [`can_transition_to`]: TransactionStatus::can_transition_to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Created locally, not yet acknowledged past creation by the server
    #[default]
    New,
    /// Another device of this account is running the transfer
    OnOtherDevice,
    /// Waiting for the recipient to accept or reject
    WaitingAccept,
    /// Accepted; waiting for the sender to provide data
    WaitingData,
    /// Negotiating endpoints between the two sides
    Connecting,
    /// Bytes are moving
    Transferring,
    /// Uploaded to intermediate cloud storage for an offline or ghost peer
    CloudBuffered,
    /// Transfer suspended by either side
    Paused,
    /// Completed successfully
    Finished,
    /// Aborted by an unrecoverable error
    Failed,
    /// Canceled by either side
    Canceled,
    /// Refused by the recipient
    Rejected,
    /// Removed (links only reach this through an explicit delete)
    Deleted,
    /// Blocked until the sender's plan allows the transfer
    PaymentRequired,
}

/// Which side of a transaction this process plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Sender,
    Recipient,
}

impl TransactionStatus {
    /// Returns true if this status terminates the transaction for `role`
    ///
    /// The five common terminals are final for both roles. PaymentRequired
    /// is final for reconciliation purposes (resync will not reopen it) but
    /// [`can_transition_to`] still allows the one edge to Canceled.
    ///
    /// [`can_transition_to`]: TransactionStatus::can_transition_to
    pub fn is_final(&self, role: Role) -> bool {
        let _ = role;
        matches!(
            self,
            TransactionStatus::Finished
                | TransactionStatus::Failed
                | TransactionStatus::Canceled
                | TransactionStatus::Rejected
                | TransactionStatus::Deleted
                | TransactionStatus::PaymentRequired
        )
    }

    /// Returns true if the transfer machinery is actively involved
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Connecting
                | TransactionStatus::Transferring
                | TransactionStatus::CloudBuffered
        )
    }

    /// Returns true if the status accepts a pause request
    pub fn is_pausable(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Connecting | TransactionStatus::Transferring
        )
    }

    /// Returns true if some user decision is pending on this device or another
    pub fn awaits_decision(&self) -> bool {
        matches!(
            self,
            TransactionStatus::New | TransactionStatus::WaitingAccept
        )
    }

    /// Checks whether `target` is reachable from this status
    ///
    /// Server updates along an unreachable edge are logged and ignored;
    /// local operations along one fail their precondition. The table is
    /// deliberately permissive from `New` because a freshly created
    /// transaction catches up with whatever the server already knows.
    pub fn can_transition_to(&self, target: TransactionStatus) -> bool {
        use TransactionStatus::*;

        if self == &target {
            return false;
        }

        // The five common terminals accept nothing further.
        if matches!(self, Finished | Failed | Canceled | Rejected | Deleted) {
            return false;
        }

        // PaymentRequired can only be resolved by cancellation.
        if matches!(self, PaymentRequired) {
            return matches!(target, Canceled);
        }

        // A paused transfer re-negotiates before completing; it can still
        // be torn down from either side.
        if matches!(self, Paused) {
            return matches!(
                target,
                Connecting | Transferring | Failed | Canceled | Rejected | Deleted
            );
        }

        // Any open status may reach the common terminals.
        if matches!(target, Finished | Failed | Canceled | Rejected | Deleted) {
            return true;
        }

        match (self, target) {
            (New, WaitingAccept)
            | (New, OnOtherDevice)
            | (New, Connecting)
            | (New, Transferring)
            | (New, CloudBuffered)
            | (New, PaymentRequired) => true,

            (WaitingAccept, WaitingData)
            | (WaitingAccept, OnOtherDevice)
            | (WaitingAccept, Connecting)
            | (WaitingAccept, PaymentRequired) => true,

            // The other device drives; only terminals come back.
            (OnOtherDevice, _) => false,

            (WaitingData, Connecting)
            | (WaitingData, Transferring)
            | (WaitingData, CloudBuffered) => true,

            (Connecting, Transferring)
            | (Connecting, CloudBuffered)
            | (Connecting, Paused) => true,

            // Peers may fall back to renegotiation mid-transfer.
            (Transferring, Connecting)
            | (Transferring, CloudBuffered)
            | (Transferring, Paused) => true,

            // A ghost recipient registering resumes a direct transfer.
            (CloudBuffered, Transferring) => true,

            _ => false,
        }
    }

    /// Returns the status name as a string
    pub fn name(&self) -> &'static str {
        match self {
            TransactionStatus::New => "new",
            TransactionStatus::OnOtherDevice => "on_other_device",
            TransactionStatus::WaitingAccept => "waiting_accept",
            TransactionStatus::WaitingData => "waiting_data",
            TransactionStatus::Connecting => "connecting",
            TransactionStatus::Transferring => "transferring",
            TransactionStatus::CloudBuffered => "cloud_buffered",
            TransactionStatus::Paused => "paused",
            TransactionStatus::Finished => "finished",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Canceled => "canceled",
            TransactionStatus::Rejected => "rejected",
            TransactionStatus::Deleted => "deleted",
            TransactionStatus::PaymentRequired => "payment_required",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Sender => write!(f, "sender"),
            Role::Recipient => write!(f, "recipient"),
        }
    }
}
