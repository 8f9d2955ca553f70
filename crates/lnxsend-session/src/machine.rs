//! Per-transaction state machine
//!
//! One [`TransactionMachine`] wraps each transaction the session tracks:
//! the last merged server record, the local sub-state that must survive a
//! restart, a watch channel join() blocks on, and the handle of the
//! transfer task when this device is moving the bytes.
//!
//! Status changes go through exactly three doors: [`set_status`] for local
//! operations (edge-checked, fallible), [`apply_server_status`] for server
//! copies (edge-checked, but terminal statuses force through open ones),
//! and [`force_status`] for the rare unconditional overwrite.
//!
//! [`set_status`]: TransactionMachine::set_status
//! [`apply_server_status`]: TransactionMachine::apply_server_status
//! [`force_status`]: TransactionMachine::force_status

use tokio::sync::watch;
use tokio::task::JoinHandle;

use lnxsend_core::domain::errors::StatusViolation;
use lnxsend_core::domain::ids::{DeviceId, TransactionId};
use lnxsend_core::domain::status::{Role, TransactionStatus};
use lnxsend_core::domain::transaction::{TransactionRecord, TransactionSnapshot};
use lnxsend_core::ports::Endpoint;

/// What a server-reported status did to the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServerStatusOutcome {
    /// Already there
    Unchanged,
    /// Moved along a valid edge
    Applied,
    /// Edge invalid, but the server said final; server wins
    Forced,
    /// Edge invalid and not final; dropped
    Ignored,
}

pub(crate) struct TransactionMachine {
    record: TransactionRecord,
    paused: bool,
    failure_reason: Option<String>,
    /// Aggregate presence of the peer, once the server has reported it
    peer_online: Option<bool>,
    peer_reachable: Option<bool>,
    /// Endpoints the peer can currently be dialed on
    peer_endpoints: Vec<Endpoint>,
    status_tx: watch::Sender<TransactionStatus>,
    transfer: Option<JoinHandle<()>>,
}

impl TransactionMachine {
    pub fn new(record: TransactionRecord) -> Self {
        let (status_tx, _) = watch::channel(record.status);
        Self {
            record,
            paused: false,
            failure_reason: None,
            peer_online: None,
            peer_reachable: None,
            peer_endpoints: Vec::new(),
            status_tx,
            transfer: None,
        }
    }

    /// Restores a machine from its durable snapshot
    pub fn from_snapshot(snapshot: TransactionSnapshot) -> Self {
        let (status_tx, _) = watch::channel(snapshot.record.status);
        Self {
            record: snapshot.record,
            paused: snapshot.paused,
            failure_reason: snapshot.failure_reason,
            peer_online: None,
            peer_reachable: None,
            peer_endpoints: Vec::new(),
            status_tx,
            transfer: None,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.record.id
    }

    pub fn record(&self) -> &TransactionRecord {
        &self.record
    }

    pub fn status(&self) -> TransactionStatus {
        self.record.status
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn set_failure_reason(&mut self, reason: Option<String>) {
        self.failure_reason = reason;
    }

    /// Records which device the recipient accepted on
    pub fn set_recipient_device(&mut self, device: DeviceId) {
        self.record.recipient_device_id = Some(device);
    }

    /// Last reported aggregate presence of the peer
    pub fn peer_online(&self) -> Option<bool> {
        self.peer_online
    }

    pub fn set_peer_online(&mut self, online: bool) {
        self.peer_online = Some(online);
    }

    pub fn peer_reachable(&self) -> Option<bool> {
        self.peer_reachable
    }

    /// Endpoints the peer was last announced on
    pub fn peer_endpoints(&self) -> &[Endpoint] {
        &self.peer_endpoints
    }

    /// Records the peer's connectivity announcement for this transaction
    pub fn set_peer_reachability(&mut self, reachable: bool, endpoints: Vec<Endpoint>) {
        self.peer_reachable = Some(reachable);
        self.peer_endpoints = endpoints;
    }

    pub fn snapshot(&self) -> TransactionSnapshot {
        TransactionSnapshot {
            record: self.record.clone(),
            paused: self.paused,
            failure_reason: self.failure_reason.clone(),
        }
    }

    /// A receiver that tracks every status this machine moves through
    pub fn subscribe(&self) -> watch::Receiver<TransactionStatus> {
        self.status_tx.subscribe()
    }

    /// Moves to `to` along a validated edge
    ///
    /// Returns `Ok(false)` when the machine is already there, so callers
    /// can emit change events exactly once.
    pub fn set_status(&mut self, to: TransactionStatus) -> Result<bool, StatusViolation> {
        if self.record.status == to {
            return Ok(false);
        }
        if !self.record.status.can_transition_to(to) {
            return Err(StatusViolation::new(self.record.status, to));
        }
        self.record.status = to;
        self.status_tx.send_replace(to);
        Ok(true)
    }

    /// Overwrites the status without edge validation
    pub fn force_status(&mut self, to: TransactionStatus) -> bool {
        if self.record.status == to {
            return false;
        }
        self.record.status = to;
        self.status_tx.send_replace(to);
        true
    }

    /// Applies the status from a fresh server copy
    ///
    /// The server is authoritative about terminals: a final status lands
    /// even when no local edge reaches it — but never over a status that is
    /// itself final, which stays put (the one exception being the validated
    /// PaymentRequired to Canceled edge). Non-final statuses off the edge
    /// table are dropped, to be reconciled by the next resync.
    pub fn apply_server_status(&mut self, to: TransactionStatus, role: Role) -> ServerStatusOutcome {
        if self.record.status == to {
            return ServerStatusOutcome::Unchanged;
        }
        if self.record.status.can_transition_to(to) {
            self.record.status = to;
            self.status_tx.send_replace(to);
            return ServerStatusOutcome::Applied;
        }
        if self.record.status.is_final(role) {
            return ServerStatusOutcome::Ignored;
        }
        if to.is_final(role) {
            self.force_status(to);
            return ServerStatusOutcome::Forced;
        }
        ServerStatusOutcome::Ignored
    }

    /// Merges the server-authoritative fields of a fresh copy
    ///
    /// Returns true if the recipient identity changed.
    pub fn absorb_record(&mut self, incoming: &TransactionRecord) -> bool {
        self.record.absorb(incoming)
    }

    pub fn has_transfer(&self) -> bool {
        self.transfer.is_some()
    }

    pub fn attach_transfer(&mut self, handle: JoinHandle<()>) {
        self.transfer = Some(handle);
    }

    /// Aborts a running transfer task, if any
    pub fn abort_transfer(&mut self) {
        if let Some(handle) = self.transfer.take() {
            handle.abort();
        }
    }

    /// Detaches a transfer task that finished on its own
    ///
    /// Called from the task itself; must not abort.
    pub fn clear_transfer(&mut self) {
        self.transfer = None;
    }
}
