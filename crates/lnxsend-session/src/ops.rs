//! Transaction operations and the transfer pipeline
//!
//! The public operations (offer, accept, reject, cancel, pause, join)
//! live on [`Session`]; the machinery that drives the transfer engine and
//! folds its phase reports back into the machines lives on `SessionInner`.
//!
//! ## Design Notes
//!
//! - Preconditions are checked under the model lock, the server RPC runs
//!   with the lock released, and the local effect re-validates on a fresh
//!   lock; a notification landing in the gap merges like any other.
//! - Each transfer runs as its own task. The engine reports phases through
//!   a channel, the task folds them into the machine as status moves, and
//!   the terminal outcome is pushed to the server exactly once.
//! - A snapshot write failure is fatal to that one transaction only: the
//!   machine is forced to failed with a reason, nothing propagates.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use lnxsend_core::domain::configuration::Configuration;
use lnxsend_core::domain::ghost_code::GhostCode;
use lnxsend_core::domain::ids::{TransactionId, UserId};
use lnxsend_core::domain::status::{Role, TransactionStatus};
use lnxsend_core::domain::transaction::TransactionRecord;
use lnxsend_core::domain::user::User;
use lnxsend_core::ports::{TransferError, TransferOutcome, TransferPhase};

use crate::errors::SessionError;
use crate::events::SessionEvent;
use crate::machine::TransactionMachine;
use crate::session::{ModelState, Session, SessionInner};

// ============================================================================
// Offers
// ============================================================================

impl Session {
    /// Offers files to another account
    ///
    /// The server assigns the id and decides whether the recipient is a
    /// ghost. Ghost offers start uploading immediately; registered
    /// recipients are asked to accept first.
    pub async fn send_files(
        &self,
        recipient: &str,
        files: Vec<String>,
        message: &str,
    ) -> Result<TransactionId, SessionError> {
        let inner = self.inner();
        if !inner.logged_in.is_open() {
            return Err(SessionError::NotLoggedIn);
        }
        let total_size = offered_size(&files).await?;
        let record = inner
            .account
            .create_transaction(recipient, &files, total_size, message)
            .await?;
        let id = record.id;
        info!(
            transaction_id = %id,
            recipient,
            files = files.len(),
            total_size,
            ghost = record.is_ghost,
            "transaction offered"
        );
        inner.adopt_record(record).await;
        Ok(id)
    }

    /// Creates a share link for the given files
    ///
    /// The upload starts right away; the URL is available on the record
    /// via [`transaction`].
    ///
    /// [`transaction`]: Session::transaction
    pub async fn create_link(
        &self,
        files: Vec<String>,
        message: &str,
    ) -> Result<TransactionId, SessionError> {
        let inner = self.inner();
        if !inner.logged_in.is_open() {
            return Err(SessionError::NotLoggedIn);
        }
        let total_size = offered_size(&files).await?;
        let record = inner
            .account
            .create_link(&files, total_size, message)
            .await?;
        let id = record.id;
        info!(transaction_id = %id, files = files.len(), total_size, "link created");
        inner.adopt_record(record).await;
        Ok(id)
    }
}

/// Sums the on-disk sizes of an offer
async fn offered_size(files: &[String]) -> Result<u64, SessionError> {
    let mut total = 0u64;
    for path in files {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|error| SessionError::UnreadableFile {
                path: path.clone(),
                reason: error.to_string(),
            })?;
        total += meta.len();
    }
    Ok(total)
}

// ============================================================================
// Decisions
// ============================================================================

impl Session {
    /// Accepts an incoming transaction on this device
    pub async fn accept(&self, id: TransactionId) -> Result<(), SessionError> {
        let inner = self.inner();
        let device = {
            let model = inner.model.lock().await;
            let me = require_me(&model)?;
            let machine = model
                .registry
                .get(id)
                .ok_or(SessionError::UnknownTransaction(id))?;
            if machine.record().role_of(me) != Role::Recipient {
                return Err(SessionError::WrongSide {
                    operation: "accept",
                    expected: Role::Recipient,
                });
            }
            if machine.status() != TransactionStatus::WaitingAccept {
                return Err(SessionError::InvalidOperation {
                    operation: "accept",
                    status: machine.status(),
                });
            }
            model.device.id
        };

        inner
            .account
            .update_transaction(id, TransactionStatus::WaitingData)
            .await?;

        let mut events = Vec::new();
        {
            let mut model = inner.model.lock().await;
            let changed = match model.registry.get_mut(id) {
                Some(machine) => {
                    machine.set_recipient_device(device);
                    match machine.set_status(TransactionStatus::WaitingData) {
                        Ok(changed) => {
                            if changed {
                                note_status(machine, &mut events);
                            }
                            true
                        }
                        Err(violation) => {
                            warn!(transaction_id = %id, error = %violation, "accept raced a terminal update");
                            false
                        }
                    }
                }
                None => false,
            };
            if changed {
                inner.persist_machine(&mut model, id, &mut events).await;
                inner.ensure_transfers(&mut model, &mut events).await;
            }
        }
        inner.emit_all(events);
        info!(transaction_id = %id, "transaction accepted");
        Ok(())
    }

    /// Declines an incoming transaction
    pub async fn reject(&self, id: TransactionId) -> Result<(), SessionError> {
        let inner = self.inner();
        {
            let model = inner.model.lock().await;
            let me = require_me(&model)?;
            let machine = model
                .registry
                .get(id)
                .ok_or(SessionError::UnknownTransaction(id))?;
            let role = machine.record().role_of(me);
            if role != Role::Recipient {
                return Err(SessionError::WrongSide {
                    operation: "reject",
                    expected: Role::Recipient,
                });
            }
            if machine.status().is_final(role) {
                return Err(SessionError::InvalidOperation {
                    operation: "reject",
                    status: machine.status(),
                });
            }
        }
        inner
            .account
            .update_transaction(id, TransactionStatus::Rejected)
            .await?;
        inner
            .finalize_locally(id, TransactionStatus::Rejected, None)
            .await;
        info!(transaction_id = %id, "transaction rejected");
        Ok(())
    }

    /// Cancels a transaction from either side
    ///
    /// With `notify_peer` the cancellation is pushed to the server first;
    /// leave it off when reacting to a decision that is already settled
    /// there.
    pub async fn cancel(&self, id: TransactionId, notify_peer: bool) -> Result<(), SessionError> {
        let inner = self.inner();
        {
            let model = inner.model.lock().await;
            let me = require_me(&model)?;
            let machine = model
                .registry
                .get(id)
                .ok_or(SessionError::UnknownTransaction(id))?;
            let role = machine.record().role_of(me);
            let status = machine.status();
            // PaymentRequired settles for reconciliation but still allows
            // the one edge to canceled.
            if status.is_final(role) && status != TransactionStatus::PaymentRequired {
                return Err(SessionError::InvalidOperation {
                    operation: "cancel",
                    status,
                });
            }
        }
        if notify_peer {
            inner
                .account
                .update_transaction(id, TransactionStatus::Canceled)
                .await?;
        }
        inner
            .finalize_locally(id, TransactionStatus::Canceled, None)
            .await;
        info!(transaction_id = %id, notify_peer, "transaction canceled");
        Ok(())
    }

    /// Drops a settled transaction from the model and its snapshot from
    /// disk
    pub async fn delete(&self, id: TransactionId) -> Result<(), SessionError> {
        let inner = self.inner();
        let mut model = inner.model.lock().await;
        let me = require_me(&model)?;
        let machine = model
            .registry
            .get(id)
            .ok_or(SessionError::UnknownTransaction(id))?;
        let role = machine.record().role_of(me);
        let status = machine.status();
        if !status.is_final(role) {
            return Err(SessionError::InvalidOperation {
                operation: "delete",
                status,
            });
        }
        model.registry.remove(id);
        if let Some(store) = model.store.as_ref() {
            if let Err(error) = store.remove(id).await {
                warn!(transaction_id = %id, error = %error, "snapshot file not removed");
            }
        }
        info!(transaction_id = %id, "transaction deleted");
        Ok(())
    }

    /// Suspends (`enable`) or resumes a transfer on this device
    ///
    /// Resuming goes back through connecting; a paused transfer never
    /// jumps straight to finished.
    pub async fn pause(&self, id: TransactionId, enable: bool) -> Result<(), SessionError> {
        let inner = self.inner();
        {
            let model = inner.model.lock().await;
            require_me(&model)?;
            let machine = model
                .registry
                .get(id)
                .ok_or(SessionError::UnknownTransaction(id))?;
            let status = machine.status();
            let allowed = if enable {
                status.is_pausable()
            } else {
                status == TransactionStatus::Paused
            };
            if !allowed {
                return Err(SessionError::InvalidOperation {
                    operation: if enable { "pause" } else { "resume" },
                    status,
                });
            }
        }
        let target = if enable {
            TransactionStatus::Paused
        } else {
            TransactionStatus::Connecting
        };
        inner.account.update_transaction(id, target).await?;
        inner.engine.pause(id, enable).await?;
        inner.apply_pause(id, enable, target).await;
        info!(transaction_id = %id, paused = enable, "transfer pause toggled");
        Ok(())
    }

    /// Waits until the transaction settles and returns the terminal status
    pub async fn join(&self, id: TransactionId) -> Result<TransactionStatus, SessionError> {
        let inner = self.inner();
        let (mut statuses, role) = {
            let model = inner.model.lock().await;
            let me = require_me(&model)?;
            let machine = model
                .registry
                .get(id)
                .ok_or(SessionError::UnknownTransaction(id))?;
            (machine.subscribe(), machine.record().role_of(me))
        };
        loop {
            let status = *statuses.borrow_and_update();
            if status.is_final(role) {
                return Ok(status);
            }
            if statuses.changed().await.is_err() {
                // The machine was deleted out from under the waiter.
                return Err(SessionError::UnknownTransaction(id));
            }
        }
    }

    /// Fraction of the transfer completed, in [0, 1]
    pub async fn progress(&self, id: TransactionId) -> Result<f64, SessionError> {
        let inner = self.inner();
        let (status, role) = {
            let model = inner.model.lock().await;
            let me = require_me(&model)?;
            let machine = model
                .registry
                .get(id)
                .ok_or(SessionError::UnknownTransaction(id))?;
            (machine.status(), machine.record().role_of(me))
        };
        if status == TransactionStatus::Finished {
            return Ok(1.0);
        }
        if status.is_final(role) {
            return Ok(0.0);
        }
        if !status.is_running() && status != TransactionStatus::Paused {
            return Ok(0.0);
        }
        match inner.engine.progress(id).await {
            Ok(value) => {
                if !(0.0..=1.0).contains(&value) {
                    warn!(transaction_id = %id, value, "engine progress out of range");
                }
                Ok(value.clamp(0.0, 1.0))
            }
            Err(error) => {
                debug!(transaction_id = %id, error = %error, "engine has no progress yet");
                Ok(0.0)
            }
        }
    }
}

// ============================================================================
// Ghost codes and model accessors
// ============================================================================

impl Session {
    /// Queues a ghost code for redemption
    ///
    /// Codes survive restarts once a session is established; before login
    /// they wait in memory and join the durable queue with it. Redemption
    /// happens after each synchronization and immediately when already
    /// logged in.
    pub async fn enqueue_ghost_code(&self, code: &str, was_link: bool) {
        let inner = self.inner();
        let code = GhostCode::new(code, was_link);
        let queued = {
            let mut model = inner.model.lock().await;
            match model.ghost_codes.as_mut() {
                Some(queue) => {
                    if let Err(error) = queue.enqueue(code).await {
                        warn!(error = %error, "ghost code queue not rewritten");
                    }
                    true
                }
                None => {
                    model.pending_ghost_codes.push(code);
                    false
                }
            }
        };
        if queued && inner.logged_in.is_open() {
            inner.flush_ghost_codes().await;
        }
    }

    /// Current records of every known transaction
    pub async fn transactions(&self) -> Vec<TransactionRecord> {
        self.inner().model.lock().await.registry.records()
    }

    /// Current record of one transaction
    pub async fn transaction(&self, id: TransactionId) -> Option<TransactionRecord> {
        self.inner()
            .model
            .lock()
            .await
            .registry
            .get(id)
            .map(|machine| machine.record().clone())
    }

    /// Every contact of the logged-in account
    pub async fn contacts(&self) -> Vec<User> {
        self.inner().model.lock().await.users.contacts()
    }

    /// Looks up an account, fetching it from the server on a cache miss
    pub async fn user(&self, id: UserId) -> Result<User, SessionError> {
        let inner = self.inner();
        if let Some(user) = inner.model.lock().await.users.user(id).cloned() {
            return Ok(user);
        }
        let user = inner.account.user(id).await?;
        inner.model.lock().await.users.insert(user.clone());
        Ok(user)
    }

    /// Cached avatar bytes, queueing a download on a miss
    pub async fn avatar(&self, id: UserId) -> Option<Vec<u8>> {
        let inner = self.inner();
        if let Some(bytes) = inner.model.lock().await.users.avatar(id) {
            return Some(bytes.to_vec());
        }
        inner.avatars.request(id);
        None
    }

    /// Server-driven runtime configuration as of the last synchronization
    pub async fn configuration(&self) -> Configuration {
        self.inner().model.lock().await.configuration.clone()
    }

    /// The logged-in account, if any
    pub async fn self_user(&self) -> Option<User> {
        self.inner().model.lock().await.me.clone()
    }
}

fn require_me(model: &ModelState) -> Result<UserId, SessionError> {
    model
        .me
        .as_ref()
        .map(|user| user.id)
        .ok_or(SessionError::NotLoggedIn)
}

pub(crate) fn note_status(machine: &TransactionMachine, events: &mut Vec<SessionEvent>) {
    events.push(SessionEvent::StatusChanged {
        transaction_id: machine.id(),
        status: machine.status(),
        failure_reason: machine.failure_reason().map(str::to_string),
    });
}

// ============================================================================
// Transfer machinery
// ============================================================================

impl SessionInner {
    /// Seeds a machine from a freshly created server record, snapshots it
    /// and starts whatever transfer it calls for
    pub(crate) async fn adopt_record(&self, record: TransactionRecord) {
        let id = record.id;
        let mut events = Vec::new();
        {
            let mut model = self.model.lock().await;
            model.registry.insert(TransactionMachine::new(record));
            self.persist_machine(&mut model, id, &mut events).await;
            self.ensure_transfers(&mut model, &mut events).await;
        }
        self.emit_all(events);
    }

    /// Promotes accepted offers into the connecting phase and spawns a
    /// transfer task for every machine this device should be running
    pub(crate) async fn ensure_transfers(
        &self,
        model: &mut ModelState,
        events: &mut Vec<SessionEvent>,
    ) {
        let Some(me) = model.me.as_ref().map(|user| user.id) else {
            return;
        };
        let device = model.device.id;

        for id in model.registry.promotable_ids(me, device) {
            let changed = match model.registry.get_mut(id) {
                Some(machine) => match machine.set_status(TransactionStatus::Connecting) {
                    Ok(true) => {
                        note_status(machine, events);
                        true
                    }
                    Ok(false) => false,
                    Err(violation) => {
                        warn!(transaction_id = %id, error = %violation, "promotion skipped");
                        false
                    }
                },
                None => false,
            };
            if changed {
                self.persist_machine(model, id, events).await;
                self.spawn_status_update(id, TransactionStatus::Connecting);
            }
        }

        for id in model.registry.runnable_ids(me, device) {
            let Some(inner) = self.weak_self.upgrade() else {
                return;
            };
            debug!(transaction_id = %id, "starting transfer task");
            let handle = tokio::spawn(run_transfer(inner, id));
            if let Some(machine) = model.registry.get_mut(id) {
                machine.attach_transfer(handle);
            }
        }
    }

    /// Folds one engine phase report into the machine
    async fn apply_transfer_phase(&self, id: TransactionId, phase: TransferPhase) {
        let status = match phase {
            TransferPhase::Connecting => TransactionStatus::Connecting,
            TransferPhase::Transferring => TransactionStatus::Transferring,
            TransferPhase::CloudBuffered => TransactionStatus::CloudBuffered,
        };
        let mut events = Vec::new();
        {
            let mut model = self.model.lock().await;
            let changed = match model.registry.get_mut(id) {
                Some(machine) => match machine.set_status(status) {
                    Ok(changed) => {
                        if changed {
                            note_status(machine, &mut events);
                        }
                        changed
                    }
                    Err(violation) => {
                        warn!(transaction_id = %id, error = %violation, "phase report rejected");
                        false
                    }
                },
                None => false,
            };
            if changed {
                self.persist_machine(&mut model, id, &mut events).await;
                self.spawn_status_update(id, status);
            }
        }
        self.emit_all(events);
    }

    /// Records the terminal outcome of a transfer and reports it upstream
    async fn finish_transfer(
        &self,
        id: TransactionId,
        outcome: Result<TransferOutcome, TransferError>,
    ) {
        let (status, reason) = match outcome {
            Ok(TransferOutcome::Finished) => (TransactionStatus::Finished, None),
            Ok(TransferOutcome::Failed { reason }) => (TransactionStatus::Failed, Some(reason)),
            Err(error) => (TransactionStatus::Failed, Some(error.to_string())),
        };
        match &reason {
            None => info!(transaction_id = %id, "transfer finished"),
            Some(reason) => warn!(transaction_id = %id, reason, "transfer failed"),
        }

        let mut events = Vec::new();
        let settled = {
            let mut model = self.model.lock().await;
            let changed = match model.registry.get_mut(id) {
                Some(machine) => {
                    machine.clear_transfer();
                    machine.set_failure_reason(reason);
                    match machine.set_status(status) {
                        Ok(changed) => {
                            if changed {
                                note_status(machine, &mut events);
                            }
                            changed
                        }
                        Err(violation) => {
                            warn!(transaction_id = %id, error = %violation, "terminal move rejected");
                            false
                        }
                    }
                }
                None => false,
            };
            if changed {
                self.persist_machine(&mut model, id, &mut events).await;
            }
            changed
        };
        self.emit_all(events);

        if settled {
            if let Err(error) = self.account.update_transaction(id, status).await {
                warn!(transaction_id = %id, error = %error, "terminal status not reported");
            }
        }
    }

    /// Local terminal move shared by reject and cancel
    pub(crate) async fn finalize_locally(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        reason: Option<String>,
    ) {
        let mut events = Vec::new();
        let had_transfer = {
            let mut model = self.model.lock().await;
            let (changed, had_transfer) = match model.registry.get_mut(id) {
                Some(machine) => {
                    let had = machine.has_transfer();
                    machine.abort_transfer();
                    machine.set_failure_reason(reason);
                    let changed = match machine.set_status(status) {
                        Ok(changed) => changed,
                        Err(violation) => {
                            warn!(transaction_id = %id, error = %violation, "terminal move rejected");
                            false
                        }
                    };
                    if changed {
                        note_status(machine, &mut events);
                    }
                    (changed, had)
                }
                None => (false, false),
            };
            if changed {
                self.persist_machine(&mut model, id, &mut events).await;
            }
            had_transfer
        };
        if had_transfer {
            self.engine.abort(id).await;
        }
        self.emit_all(events);
    }

    /// Applies a pause toggle, local or peer-initiated
    pub(crate) async fn apply_pause(
        &self,
        id: TransactionId,
        paused: bool,
        target: TransactionStatus,
    ) {
        let mut events = Vec::new();
        {
            let mut model = self.model.lock().await;
            let changed = match model.registry.get_mut(id) {
                Some(machine) => {
                    machine.set_paused(paused);
                    match machine.set_status(target) {
                        Ok(changed) => {
                            if changed {
                                note_status(machine, &mut events);
                            }
                            changed
                        }
                        Err(violation) => {
                            warn!(transaction_id = %id, error = %violation, "pause toggle raced a terminal update");
                            false
                        }
                    }
                }
                None => false,
            };
            if changed {
                self.persist_machine(&mut model, id, &mut events).await;
                if !paused {
                    self.ensure_transfers(&mut model, &mut events).await;
                }
            }
        }
        self.emit_all(events);
    }

    /// Writes the machine's snapshot; a failure fails that transaction
    ///
    /// Nothing propagates from here: an unwritable disk marks the one
    /// machine failed (unless already settled) and the session moves on.
    pub(crate) async fn persist_machine(
        &self,
        model: &mut ModelState,
        id: TransactionId,
        events: &mut Vec<SessionEvent>,
    ) {
        let Some(snapshot) = model.registry.get(id).map(TransactionMachine::snapshot) else {
            return;
        };
        let Some(store) = model.store.as_ref() else {
            return;
        };
        if let Err(error) = store.save(&snapshot).await {
            warn!(transaction_id = %id, error = %error, "transaction snapshot not written");
            let me = model.me.as_ref().map(|user| user.id);
            if let Some(machine) = model.registry.get_mut(id) {
                let role = me
                    .map(|me| machine.record().role_of(me))
                    .unwrap_or(Role::Sender);
                if !machine.status().is_final(role) {
                    machine.abort_transfer();
                    machine.set_failure_reason(Some(format!("local state write failed: {error}")));
                    if machine.force_status(TransactionStatus::Failed) {
                        note_status(machine, events);
                    }
                }
            }
        }
    }

    /// Reports a status move to the server without blocking the caller
    fn spawn_status_update(&self, id: TransactionId, status: TransactionStatus) {
        let account = Arc::clone(&self.account);
        tokio::spawn(async move {
            if let Err(error) = account.update_transaction(id, status).await {
                warn!(transaction_id = %id, status = status.name(), error = %error, "status update not delivered");
            }
        });
    }
}

/// Drives one transfer to completion
///
/// Runs as its own task so a stuck engine never wedges the session; the
/// machine holds the task handle and aborts it on cancellation or
/// connection loss.
async fn run_transfer(inner: Arc<SessionInner>, id: TransactionId) {
    let record = {
        let model = inner.model.lock().await;
        match model.registry.get(id) {
            Some(machine) => machine.record().clone(),
            None => return,
        }
    };

    let (phase_tx, mut phase_rx) = mpsc::unbounded_channel();
    let sink = move |phase: TransferPhase| {
        let _ = phase_tx.send(phase);
    };
    let engine = Arc::clone(&inner.engine);
    let run = engine.run(&record, &sink);
    tokio::pin!(run);

    let outcome = loop {
        tokio::select! {
            maybe_phase = phase_rx.recv() => {
                if let Some(phase) = maybe_phase {
                    inner.apply_transfer_phase(id, phase).await;
                }
            }
            outcome = &mut run => break outcome,
        }
    };
    // Phases reported in the same poll the engine finished in.
    while let Ok(phase) = phase_rx.try_recv() {
        inner.apply_transfer_phase(id, phase).await;
    }
    inner.finish_transfer(id, outcome).await;
}
