//! Notification dispatcher
//!
//! One total function from a server-initiated [`Notification`] to its
//! model effect, run by the poll loop strictly in delivery order. The
//! match is exhaustive on purpose: a new notification kind without a
//! handler here must fail to build, not vanish at runtime.
//!
//! Four kinds are transport artifacts the channel adapter consumes
//! itself; their arrival marks a broken adapter and panics.

use serde_json::Value;
use tracing::{debug, info, warn};

use lnxsend_core::domain::status::TransactionStatus;
use lnxsend_core::domain::transaction::TransactionRecord;
use lnxsend_core::domain::user::User;
use lnxsend_core::ports::Notification;

use crate::events::SessionEvent;
use crate::session::SessionInner;

impl SessionInner {
    pub(crate) async fn dispatch_notification(&self, notification: Notification) {
        debug!(kind = notification.kind_name(), "notification");
        match notification {
            Notification::ConfigurationUpdate { patch } => {
                self.model.lock().await.configuration.apply_patch(&patch);
                debug!("configuration patched");
            }

            Notification::UserStatus {
                user_id,
                device_id,
                online,
            } => {
                let change = {
                    let mut model = self.model.lock().await;
                    let prior = model.users.user(user_id).map(User::online);
                    match model.users.set_presence(user_id, device_id, online) {
                        Some(now) if prior != Some(now) => {
                            // Open transactions with this peer care too.
                            if let Some(me) = model.me.as_ref().map(|user| user.id) {
                                let reached =
                                    model.registry.set_peer_presence(me, user_id, now);
                                if !reached.is_empty() {
                                    debug!(
                                        user_id = %user_id,
                                        transactions = reached.len(),
                                        "peer presence forwarded"
                                    );
                                }
                            }
                            Some(now)
                        }
                        Some(_) => None,
                        None => {
                            debug!(user_id = %user_id, "presence for unknown account dropped");
                            None
                        }
                    }
                };
                if let Some(online) = change {
                    self.emit(SessionEvent::PresenceChanged { user_id, online });
                }
            }

            Notification::LinkTransactionUpdate { record }
            | Notification::PeerTransactionUpdate { record } => {
                self.merge_pushed_record(record).await;
            }

            Notification::NewSwagger { user } => {
                let added = { self.model.lock().await.users.add_swagger(user.clone()) };
                if added {
                    info!(user_id = %user.id, handle = %user.handle, "new contact");
                    self.avatars.request(user.id);
                    self.emit(SessionEvent::NewContact { user });
                }
            }

            Notification::DeletedSwagger { user_id } => {
                let removed = { self.model.lock().await.users.remove_swagger(user_id) };
                if removed {
                    info!(user_id = %user_id, "contact removed");
                    self.emit(SessionEvent::DeletedContact { user_id });
                }
            }

            Notification::DeletedFavorite { user_id } => {
                self.emit(SessionEvent::DeletedFavorite { user_id });
            }

            Notification::PeerReachability {
                transaction_id,
                reachable,
                endpoints,
            } => {
                debug!(
                    transaction_id = %transaction_id,
                    reachable,
                    endpoints = endpoints.len(),
                    "peer reachability changed"
                );
                let mut model = self.model.lock().await;
                match model.registry.get_mut(transaction_id) {
                    Some(machine) => machine.set_peer_reachability(reachable, endpoints),
                    None => {
                        debug!(transaction_id = %transaction_id, "reachability for unknown transaction dropped");
                    }
                }
            }

            Notification::InvalidCredentials => {
                self.kick_out("session invalidated by server").await;
            }

            Notification::ModelUpdate { patch } => {
                self.apply_model_patch(&patch).await;
            }

            Notification::TransferPaused {
                transaction_id,
                paused,
            } => {
                if let Err(error) = self.engine.pause(transaction_id, paused).await {
                    warn!(transaction_id = %transaction_id, error = %error, "peer pause not forwarded to engine");
                }
                let target = if paused {
                    TransactionStatus::Paused
                } else {
                    TransactionStatus::Connecting
                };
                self.apply_pause(transaction_id, paused, target).await;
            }

            Notification::DirectMessage { sender_id, message } => {
                self.emit(SessionEvent::MessageReceived { sender_id, message });
            }

            artifact @ (Notification::ConnectionEnabled
            | Notification::Ping
            | Notification::NetworkUpdate { .. }
            | Notification::Suicide) => {
                unreachable!(
                    "transport artifact {} escaped the channel adapter",
                    artifact.kind_name()
                )
            }
        }
    }

    /// Merges a pushed transaction copy and reacts to what it changed
    async fn merge_pushed_record(&self, record: TransactionRecord) {
        let mut events = Vec::new();
        let aborted = {
            let mut model = self.model.lock().await;
            let Some(me) = model.me.as_ref().map(|user| user.id) else {
                return;
            };
            let report = model.registry.merge_server_record(me, &record);
            events.extend(report.events);
            if report.changed {
                self.persist_machine(&mut model, record.id, &mut events).await;
            }
            let aborted = match model.registry.get_mut(record.id) {
                Some(machine) => {
                    let role = machine.record().role_of(me);
                    if machine.status().is_final(role) && machine.has_transfer() {
                        machine.abort_transfer();
                        true
                    } else {
                        false
                    }
                }
                None => false,
            };
            self.ensure_transfers(&mut model, &mut events).await;
            aborted
        };
        if aborted {
            self.engine.abort(record.id).await;
        }
        self.emit_all(events);
    }

    /// Folds a partial self-user/device patch into the model
    async fn apply_model_patch(&self, patch: &Value) {
        let mut model = self.model.lock().await;
        if let Some(name) = patch
            .get("device")
            .and_then(|device| device.get("name"))
            .and_then(Value::as_str)
        {
            model.device.name = name.to_string();
        }
        let refreshed = match model.me.as_mut() {
            Some(me) => {
                if let Some(fullname) = patch.get("fullname").and_then(Value::as_str) {
                    me.fullname = fullname.to_string();
                }
                if let Some(handle) = patch.get("handle").and_then(Value::as_str) {
                    me.handle = handle.to_string();
                }
                Some(me.clone())
            }
            None => None,
        };
        if let Some(me) = refreshed {
            model.users.insert(me);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
