//! Transaction registry
//!
//! Owns every [`TransactionMachine`] of the current login session, keyed
//! by transaction id, and implements the merge rules for server copies:
//! unknown ids seed new machines, known ids absorb the fresh fields, and
//! status moves only as the machine allows. Transactions the server stops
//! reporting are left alone; history stays local.

use std::collections::HashMap;

use tracing::{debug, warn};

use lnxsend_core::domain::ids::{DeviceId, TransactionId, UserId};
use lnxsend_core::domain::status::{Role, TransactionStatus};
use lnxsend_core::domain::transaction::{TransactionKind, TransactionRecord};

use crate::events::SessionEvent;
use crate::machine::{ServerStatusOutcome, TransactionMachine};

/// What merging one server record changed
#[derive(Debug, Default)]
pub(crate) struct MergeReport {
    /// A machine was created for a previously unknown id
    pub seeded: bool,
    /// Something snapshot-worthy moved
    pub changed: bool,
    pub events: Vec<SessionEvent>,
}

#[derive(Default)]
pub(crate) struct TransactionRegistry {
    machines: HashMap<TransactionId, TransactionMachine>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: TransactionId) -> Option<&TransactionMachine> {
        self.machines.get(&id)
    }

    pub fn get_mut(&mut self, id: TransactionId) -> Option<&mut TransactionMachine> {
        self.machines.get_mut(&id)
    }

    pub fn insert(&mut self, machine: TransactionMachine) {
        self.machines.insert(machine.id(), machine);
    }

    pub fn remove(&mut self, id: TransactionId) -> Option<TransactionMachine> {
        self.machines.remove(&id)
    }

    pub fn contains(&self, id: TransactionId) -> bool {
        self.machines.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn records(&self) -> Vec<TransactionRecord> {
        self.machines
            .values()
            .map(|machine| machine.record().clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransactionMachine> {
        self.machines.values()
    }

    pub fn clear(&mut self) {
        for machine in self.machines.values_mut() {
            machine.abort_transfer();
        }
        self.machines.clear();
    }

    /// Merges one server copy into the registry
    ///
    /// Seeds a machine for an unknown id (the server is the only source of
    /// new records), otherwise absorbs the fresh fields and applies the
    /// status through the machine's edge table. Events describe exactly
    /// what moved; an idempotent merge reports nothing.
    pub fn merge_server_record(&mut self, me: UserId, incoming: &TransactionRecord) -> MergeReport {
        let role = incoming.role_of(me);
        let mut report = MergeReport::default();

        let Some(machine) = self.machines.get_mut(&incoming.id) else {
            debug!(transaction_id = %incoming.id, status = incoming.status.name(), "seeding transaction");
            let machine = TransactionMachine::new(incoming.clone());
            report.events.push(SessionEvent::StatusChanged {
                transaction_id: incoming.id,
                status: incoming.status,
                failure_reason: None,
            });
            self.machines.insert(incoming.id, machine);
            report.seeded = true;
            report.changed = true;
            return report;
        };

        let clicks_before = machine.record().click_count;
        if machine.absorb_record(incoming) {
            if let Some(recipient_id) = machine.record().recipient_id {
                report.changed = true;
                report.events.push(SessionEvent::RecipientChanged {
                    transaction_id: incoming.id,
                    recipient_id,
                });
            }
        }
        let clicks_after = machine.record().click_count;
        if clicks_after != clicks_before && machine.record().kind == TransactionKind::Link {
            report.changed = true;
            report.events.push(SessionEvent::LinkClicked {
                transaction_id: incoming.id,
                click_count: clicks_after,
            });
        }

        match machine.apply_server_status(incoming.status, role) {
            ServerStatusOutcome::Unchanged => {}
            ServerStatusOutcome::Applied => {
                report.changed = true;
                report.events.push(SessionEvent::StatusChanged {
                    transaction_id: incoming.id,
                    status: incoming.status,
                    failure_reason: machine.failure_reason().map(String::from),
                });
            }
            ServerStatusOutcome::Forced => {
                warn!(
                    transaction_id = %incoming.id,
                    status = incoming.status.name(),
                    "server forced a terminal status outside the edge table"
                );
                machine.abort_transfer();
                report.changed = true;
                report.events.push(SessionEvent::StatusChanged {
                    transaction_id: incoming.id,
                    status: incoming.status,
                    failure_reason: machine.failure_reason().map(String::from),
                });
            }
            ServerStatusOutcome::Ignored => {
                warn!(
                    transaction_id = %incoming.id,
                    from = machine.status().name(),
                    to = incoming.status.name(),
                    "ignoring server status outside the edge table"
                );
            }
        }
        report
    }

    /// Forwards a peer's aggregate presence to every open transaction the
    /// peer is the remote side of; returns the ids reached
    pub fn set_peer_presence(
        &mut self,
        me: UserId,
        user: UserId,
        online: bool,
    ) -> Vec<TransactionId> {
        let mut reached = Vec::new();
        for machine in self.machines.values_mut() {
            let record = machine.record();
            let role = record.role_of(me);
            if machine.status().is_final(role) || !record.peer_is(me, user) {
                continue;
            }
            machine.set_peer_online(online);
            reached.push(machine.id());
        }
        reached
    }

    /// Aborts every transfer task; returns the ids that had one
    ///
    /// Used when the push connection drops: machines keep their status and
    /// pause flag, the resync that follows decides what restarts.
    pub fn reset_transfers(&mut self) -> Vec<TransactionId> {
        let mut reset = Vec::new();
        for machine in self.machines.values_mut() {
            if machine.has_transfer() {
                machine.abort_transfer();
                reset.push(machine.id());
            }
        }
        reset
    }

    /// Transactions this device should be running a transfer for
    ///
    /// Besides the statuses the transfer machinery is already involved in,
    /// freshly offered links and ghost offers qualify: they have no
    /// acceptance step and start straight from `New`.
    pub fn runnable_ids(&self, me: UserId, device: DeviceId) -> Vec<TransactionId> {
        self.machines
            .values()
            .filter(|machine| {
                let record = machine.record();
                let ready = machine.status().is_running()
                    || (machine.status() == TransactionStatus::New
                        && record.starts_unattended());
                record.concerns_device(me, device)
                    && ready
                    && !machine.paused()
                    && !machine.has_transfer()
            })
            .map(TransactionMachine::id)
            .collect()
    }

    /// Sender-side transactions whose recipient accepted and which now
    /// need promoting into the connecting phase
    pub fn promotable_ids(&self, me: UserId, device: DeviceId) -> Vec<TransactionId> {
        self.machines
            .values()
            .filter(|machine| {
                let record = machine.record();
                record.role_of(me) == Role::Sender
                    && record.sender_device_id == device
                    && record.status == TransactionStatus::WaitingData
                    && record.recipient_device_id.is_some()
            })
            .map(TransactionMachine::id)
            .collect()
    }
}
