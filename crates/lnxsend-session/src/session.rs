//! Session lifecycle
//!
//! [`Session`] is the heart of the engine: it owns the login/logout state
//! machine, the push-connection recovery loop, the periodic keep-alive,
//! and the model that every other module reads through it. One `Session`
//! outlives many login sessions; per-login state is torn down completely
//! on logout and rebuilt on the next login.
//!
//! ## Design Notes
//!
//! - Login attempts serialize on a permit mutex. A logout cancels every
//!   in-flight login *before* taking the permit, so it can never deadlock
//!   behind a retry loop.
//! - Lifecycle milestones are level-triggered latches (`logged_in`,
//!   `logged_out`, `synchronized`); late waiters fall through instead of
//!   missing an edge.
//! - All model state sits behind one async mutex. Events are collected
//!   under the lock and dispatched after it is released, so handlers can
//!   call back into the session.
//! - Background tasks (notification loop, keep-alive, avatar downloads)
//!   run under a per-login cancellation scope; logout cancels the scope
//!   and never joins from inside it.

use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lnxsend_core::config::Config;
use lnxsend_core::domain::configuration::Configuration;
use lnxsend_core::domain::device::Device;
use lnxsend_core::domain::ghost_code::GhostCode;
use lnxsend_core::domain::ids::{DeviceId, SessionId};
use lnxsend_core::domain::user::{ExternalAccount, User};
use lnxsend_core::ports::{
    AccountError, ChannelError, Endpoint, IAccountService, IIdentityStore, INotificationChannel,
    ITransferEngine, LoginResponse, SynchronizeSnapshot,
};
use lnxsend_store::{GhostCodeQueue, SnapshotStore};

use crate::avatars::AvatarQueue;
use crate::errors::SessionError;
use crate::events::{CallbackHandler, EventDispatcher, EventHandler, SessionEvent};
use crate::latch::Latch;
use crate::machine::TransactionMachine;
use crate::registry::TransactionRegistry;
use crate::users::UserCache;

// ============================================================================
// Session
// ============================================================================

/// The session and transaction engine
///
/// Construct one per process with the collaborator ports, register event
/// handlers, then drive it through [`login`]/[`logout`] and the
/// transaction operations. Clones share the same session.
///
/// [`login`]: Session::login
/// [`logout`]: Session::logout
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    pub(crate) weak_self: Weak<SessionInner>,
    pub(crate) config: Config,
    pub(crate) account: Arc<dyn IAccountService>,
    pub(crate) channel: Arc<dyn INotificationChannel>,
    pub(crate) engine: Arc<dyn ITransferEngine>,
    pub(crate) identity: Arc<dyn IIdentityStore>,
    pub(crate) events: EventDispatcher,
    pub(crate) logged_in: Latch,
    pub(crate) logged_out: Latch,
    pub(crate) synchronized: Latch,
    pub(crate) login_permit: Mutex<()>,
    /// Parent of every in-flight login's cancel token; shutdown swaps it
    /// out and cancels the old one, reaching all attempts at once
    pub(crate) login_cancel: StdMutex<CancellationToken>,
    pub(crate) scope: StdMutex<Option<CancellationToken>>,
    pub(crate) avatars: AvatarQueue,
    pub(crate) model: Mutex<ModelState>,
}

/// Everything the session knows about the logged-in account
///
/// Guarded by one mutex; helpers collect events under the lock and let the
/// caller dispatch them after releasing it.
pub(crate) struct ModelState {
    pub device: Device,
    pub me: Option<User>,
    pub session_id: Option<SessionId>,
    pub users: UserCache,
    pub registry: TransactionRegistry,
    pub configuration: Configuration,
    pub external_accounts: Vec<ExternalAccount>,
    pub store: Option<SnapshotStore>,
    pub ghost_codes: Option<GhostCodeQueue>,
    /// Codes received before any session was logged in
    pub pending_ghost_codes: Vec<GhostCode>,
}

/// Why a synchronization pass did not complete
pub(crate) enum SyncFailure {
    /// The RPC failed; retryable
    Account(AccountError),
    /// The server no longer recognizes this device; the session must end
    Kicked(String),
}

/// How a connection-recovery pass ended
enum Recovery {
    /// Reconnected and resynchronized; polling may resume
    Resumed,
    /// The session is over; the notification loop must exit
    Stopped,
}

impl Session {
    #[must_use]
    pub fn new(
        config: Config,
        account: Arc<dyn IAccountService>,
        channel: Arc<dyn INotificationChannel>,
        engine: Arc<dyn ITransferEngine>,
        identity: Arc<dyn IIdentityStore>,
    ) -> Self {
        let device = Device::new(DeviceId::new(), &config.device.name);
        let inner = Arc::new_cyclic(|weak| SessionInner {
            weak_self: weak.clone(),
            config,
            account,
            channel,
            engine,
            identity,
            events: EventDispatcher::new(),
            logged_in: Latch::new(false),
            logged_out: Latch::new(true),
            synchronized: Latch::new(false),
            login_permit: Mutex::new(()),
            login_cancel: StdMutex::new(CancellationToken::new()),
            scope: StdMutex::new(None),
            avatars: AvatarQueue::new(),
            model: Mutex::new(ModelState {
                device,
                me: None,
                session_id: None,
                users: UserCache::new(),
                registry: TransactionRegistry::new(),
                configuration: Configuration::default(),
                external_accounts: Vec::new(),
                store: None,
                ghost_codes: None,
                pending_ghost_codes: Vec::new(),
            }),
        });
        Self { inner }
    }

    /// Registers an event handler
    pub fn add_handler(&self, handler: Arc<dyn EventHandler>) {
        self.inner.events.add_handler(handler);
    }

    /// Registers a closure as an event handler
    pub fn on_event<F>(&self, callback: F)
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.add_handler(Arc::new(CallbackHandler::new(callback)));
    }

    /// Authenticates and establishes the session
    ///
    /// Retries transient failures with a jittered cooldown until the
    /// configured deadline (forever when none is set). Permanent failures
    /// (wrong credentials, unconfirmed email, rejected protocol version,
    /// device conflict) surface immediately. A concurrent [`logout`]
    /// cancels the attempt.
    ///
    /// Calling this on an already established session logs it out first; a
    /// caller that finds the session established once it holds the permit
    /// (a concurrent login won the race) returns success without another
    /// authentication round.
    ///
    /// [`logout`]: Session::logout
    pub async fn login(&self, email: &str, password: &str) -> Result<(), SessionError> {
        if self.inner.logged_in.is_open() {
            self.inner.shutdown(None).await;
        }
        let cancel = self.inner.login_cancel.lock().unwrap().child_token();

        let _permit = tokio::select! {
            permit = self.inner.login_permit.lock() => permit,
            _ = cancel.cancelled() => return Err(SessionError::LoginCanceled),
        };
        if self.inner.logged_in.is_open() {
            return Ok(());
        }
        self.inner.login_with_retries(email, password, &cancel).await
    }

    /// Tears the session down; idempotent
    ///
    /// Cancels any login in flight, aborts transfers, disconnects the push
    /// connection and fires one bounded, background server-side logout.
    pub async fn logout(&self) {
        self.inner.shutdown(None).await;
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.logged_in.is_open()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.channel.is_connected()
    }

    /// Blocks until a session is fully established
    pub async fn wait_logged_in(&self) {
        self.inner.logged_in.wait().await;
    }

    /// Blocks until no session is established
    pub async fn wait_logged_out(&self) {
        self.inner.logged_out.wait().await;
    }

    /// Blocks until the model reflects a completed synchronization
    pub async fn wait_synchronized(&self) {
        self.inner.synchronized.wait().await;
    }

    pub(crate) fn inner(&self) -> &Arc<SessionInner> {
        &self.inner
    }
}

// ============================================================================
// Login
// ============================================================================

impl SessionInner {
    async fn login_with_retries(
        &self,
        email: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let deadline = self
            .config
            .session
            .login_deadline_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.attempt_login(email, password, cancel).await {
                Ok(()) => {
                    info!(attempt, "session established");
                    return Ok(());
                }
                Err(SessionError::LoginCanceled) => return Err(SessionError::LoginCanceled),
                Err(error) if error.is_permanent_login_failure() => {
                    warn!(attempt, error = %error, "login failed permanently");
                    self.emit(SessionEvent::ConnectionStatus {
                        connected: false,
                        still_trying: false,
                        last_error: Some(error.to_string()),
                    });
                    self.logged_out.open();
                    return Err(error);
                }
                Err(error) => {
                    warn!(attempt, error = %error, "login failed, will retry");
                    self.emit(SessionEvent::ConnectionStatus {
                        connected: false,
                        still_trying: true,
                        last_error: Some(error.to_string()),
                    });
                    let pause = self.cooldown_with_jitter();
                    if let Some(deadline) = deadline {
                        if Instant::now() + pause >= deadline {
                            self.emit(SessionEvent::ConnectionStatus {
                                connected: false,
                                still_trying: false,
                                last_error: Some("login deadline exceeded".to_string()),
                            });
                            self.logged_out.open();
                            return Err(SessionError::LoginDeadlineExceeded);
                        }
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(pause) => {}
                        _ = cancel.cancelled() => return Err(SessionError::LoginCanceled),
                    }
                }
            }
        }
    }

    /// One complete login attempt: authenticate, unlock the identity,
    /// recover durable state, connect the push wire and synchronize
    async fn attempt_login(
        &self,
        email: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let device = { self.model.lock().await.device.clone() };

        let response = tokio::select! {
            response = self.account.login(email, password, &device) => response?,
            _ = cancel.cancelled() => return Err(SessionError::LoginCanceled),
        };
        let user_id = response.self_user.id;
        info!(user_id = %user_id, device_id = %response.device.id, "authenticated");

        self.identity
            .unlock(user_id, &response.identity, password)
            .await?;
        if let Some(passport) = response.device.passport.clone() {
            if let Err(error) = self
                .identity
                .persist(user_id, &response.identity, &passport)
                .await
            {
                warn!(error = %error, "identity material not persisted");
            }
        }

        self.seed_model(&response).await;

        if cancel.is_cancelled() {
            self.clear_session_model().await;
            return Err(SessionError::LoginCanceled);
        }

        let endpoint = self.endpoint_with_override(response.notification_endpoint.clone());
        if let Err(error) = self
            .channel
            .connect(user_id, response.device.id, response.session_id, endpoint)
            .await
        {
            self.clear_session_model().await;
            return Err(error.into());
        }

        self.logged_out.close();

        if let Err(failure) = self.synchronize_and_publish(true).await {
            self.channel.disconnect().await;
            self.clear_session_model().await;
            self.logged_out.open();
            return Err(match failure {
                SyncFailure::Account(error) => error.into(),
                // At login the server registers this device itself, so a
                // missing self-device here is an anomaly worth retrying.
                SyncFailure::Kicked(reason) => AccountError::Server(reason).into(),
            });
        }

        let scope = CancellationToken::new();
        *self.scope.lock().unwrap() = Some(scope.clone());
        self.spawn_session_tasks(scope);
        Ok(())
    }

    /// Populates the per-user model from the login response and recovers
    /// snapshots and queued ghost codes from disk
    async fn seed_model(&self, response: &LoginResponse) {
        let user_id = response.self_user.id;
        let mut model = self.model.lock().await;
        model.me = Some(response.self_user.clone());
        model.users.insert(response.self_user.clone());
        model.device = response.device.clone();
        model.session_id = Some(response.session_id);
        model.configuration.set_features(response.features.clone());

        let store = SnapshotStore::new(&self.config.storage.home_dir, user_id);
        match store.load_all().await {
            Ok(snapshots) => {
                if !snapshots.is_empty() {
                    info!(count = snapshots.len(), "recovered transaction snapshots");
                }
                for snapshot in snapshots {
                    model
                        .registry
                        .insert(TransactionMachine::from_snapshot(snapshot));
                }
            }
            Err(error) => warn!(error = %error, "transaction snapshots not recovered"),
        }
        model.store = Some(store);

        match GhostCodeQueue::open(&self.config.storage.home_dir, user_id).await {
            Ok(mut queue) => {
                let pending: Vec<GhostCode> = model.pending_ghost_codes.drain(..).collect();
                for code in pending {
                    if let Err(error) = queue.enqueue(code).await {
                        warn!(error = %error, "pre-login ghost code not queued");
                    }
                }
                model.ghost_codes = Some(queue);
            }
            Err(error) => warn!(error = %error, "ghost code queue not opened"),
        }
    }

    /// Drops all per-login model state; the device identity survives
    pub(crate) async fn clear_session_model(&self) {
        let mut model = self.model.lock().await;
        model.registry.clear();
        model.users.clear();
        model.me = None;
        model.session_id = None;
        model.store = None;
        model.ghost_codes = None;
        model.external_accounts.clear();
        model.configuration = Configuration::default();
    }

    fn cooldown_with_jitter(&self) -> Duration {
        let factor: f64 = rand::thread_rng().gen_range(1.0..=1.5);
        Duration::from_secs(self.config.session.reconnection_cooldown_secs).mul_f64(factor)
    }

    pub(crate) fn endpoint_with_override(&self, mut endpoint: Endpoint) -> Endpoint {
        if let Some(host) = &self.config.endpoints.notification_host {
            endpoint.host = host.clone();
        }
        if let Some(port) = self.config.endpoints.notification_port {
            endpoint.port = port;
        }
        endpoint
    }
}

// ============================================================================
// Logout
// ============================================================================

impl SessionInner {
    /// Tears the session down; `reason` is surfaced as a final
    /// connection-status event when present
    pub(crate) async fn shutdown(&self, reason: Option<String>) {
        // Free every login stuck before or inside the permit, then take it.
        // Outstanding attempts all hold children of the parent token.
        let stale = {
            let mut parent = self.login_cancel.lock().unwrap();
            std::mem::replace(&mut *parent, CancellationToken::new())
        };
        stale.cancel();
        let _permit = self.login_permit.lock().await;

        let scope = self.scope.lock().unwrap().take();
        let had_session = { self.model.lock().await.session_id.is_some() };
        if scope.is_none() && !had_session {
            self.logged_out.open();
            return;
        }
        if let Some(scope) = scope {
            scope.cancel();
        }

        let aborted = { self.model.lock().await.registry.reset_transfers() };
        for id in aborted {
            self.engine.abort(id).await;
        }

        // Server-side logout is best effort: bounded, in the background,
        // never blocking the local teardown.
        let account = Arc::clone(&self.account);
        let bound = Duration::from_secs(self.config.session.logout_timeout_secs);
        tokio::spawn(async move {
            match tokio::time::timeout(bound, account.logout()).await {
                Ok(Ok(())) => debug!("server-side logout acknowledged"),
                Ok(Err(error)) => warn!(error = %error, "server-side logout failed"),
                Err(_) => warn!("server-side logout timed out"),
            }
        });

        self.channel.disconnect().await;
        self.identity.clear().await;
        self.clear_session_model().await;
        self.avatars.clear();
        self.logged_in.close();
        self.synchronized.close();
        self.logged_out.open();
        if let Some(reason) = reason {
            self.emit(SessionEvent::ConnectionStatus {
                connected: false,
                still_trying: false,
                last_error: Some(reason),
            });
        }
        info!("session closed");
    }

    /// Forced logout on a server-side decision; never retried
    pub(crate) async fn kick_out(&self, reason: &str) {
        warn!(reason, "kicked out of session");
        self.shutdown(Some(reason.to_string())).await;
    }
}

// ============================================================================
// Synchronization
// ============================================================================

impl SessionInner {
    /// Fetches the full model snapshot and applies it
    ///
    /// On success opens the synchronization latch (and, on the first pass
    /// of a login, the logged-in latch), redeems queued ghost codes and
    /// announces the healthy connection.
    pub(crate) async fn synchronize_and_publish(&self, first: bool) -> Result<(), SyncFailure> {
        let snapshot = self
            .account
            .synchronize(true)
            .await
            .map_err(SyncFailure::Account)?;

        let mut events = Vec::new();
        let kicked = {
            let mut model = self.model.lock().await;
            match self
                .apply_model_snapshot(&mut model, snapshot, &mut events)
                .await
            {
                Ok(()) => {
                    self.ensure_transfers(&mut model, &mut events).await;
                    None
                }
                Err(reason) => Some(reason),
            }
        };
        self.emit_all(events);
        if let Some(reason) = kicked {
            return Err(SyncFailure::Kicked(reason));
        }

        self.synchronized.open();
        if first {
            self.logged_in.open();
        }
        self.emit(SessionEvent::Synchronized);
        self.flush_ghost_codes().await;
        self.emit(SessionEvent::ConnectionStatus {
            connected: true,
            still_trying: false,
            last_error: None,
        });
        info!(first, "model synchronized");
        Ok(())
    }

    /// Applies one synchronization snapshot in canonical order: account,
    /// devices, external accounts, contacts, transactions, links
    ///
    /// Returns the kick reason if the server no longer lists this device.
    async fn apply_model_snapshot(
        &self,
        model: &mut ModelState,
        snapshot: SynchronizeSnapshot,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), String> {
        let me = snapshot.self_user.id;
        model.me = Some(snapshot.self_user.clone());
        model.users.insert(snapshot.self_user);

        let device_id = model.device.id;
        match snapshot.devices.iter().find(|device| device.id == device_id) {
            Some(own) => model.device = own.clone(),
            None => return Err("this device was removed from the account".to_string()),
        }

        model.external_accounts = snapshot.external_accounts;

        let diff = model.users.apply_swaggers(snapshot.swaggers);
        for user in diff.added {
            self.avatars.request(user.id);
            events.push(SessionEvent::NewContact { user });
        }
        for user_id in diff.removed {
            events.push(SessionEvent::DeletedContact { user_id });
        }

        for record in snapshot
            .running_transactions
            .iter()
            .chain(snapshot.final_transactions.iter())
            .chain(snapshot.link_transactions.iter())
        {
            let report = model.registry.merge_server_record(me, record);
            events.extend(report.events);
            if report.changed {
                self.persist_machine(model, record.id, events).await;
            }
        }
        Ok(())
    }

    /// Redeems every queued ghost code against the account service
    ///
    /// A code answered with AlreadyUsed is spent and leaves the queue like
    /// a successful one; transient failures keep it queued for the next
    /// pass.
    pub(crate) async fn flush_ghost_codes(&self) {
        let codes: Vec<GhostCode> = {
            let model = self.model.lock().await;
            model
                .ghost_codes
                .as_ref()
                .map(|queue| queue.codes().to_vec())
                .unwrap_or_default()
        };

        for code in codes {
            let spent = match self.account.use_ghost_code(&code.code).await {
                Ok(()) => {
                    info!(code = %code.code, was_link = code.was_link, "ghost code redeemed");
                    true
                }
                Err(AccountError::CodeAlreadyUsed) => {
                    warn!(code = %code.code, "ghost code already used elsewhere");
                    true
                }
                Err(error) => {
                    warn!(code = %code.code, error = %error, "ghost code redemption failed, keeping it queued");
                    false
                }
            };
            if spent {
                let mut model = self.model.lock().await;
                if let Some(queue) = model.ghost_codes.as_mut() {
                    if let Err(error) = queue.remove(&code).await {
                        warn!(error = %error, "ghost code queue not rewritten");
                    }
                }
            }
        }
    }
}

// ============================================================================
// Background tasks
// ============================================================================

impl SessionInner {
    fn spawn_session_tasks(&self, scope: CancellationToken) {
        let Some(inner) = self.weak_self.upgrade() else {
            return;
        };
        tokio::spawn(Arc::clone(&inner).run_notification_loop(scope.clone()));
        tokio::spawn(Arc::clone(&inner).run_heartbeat(scope.clone()));
        tokio::spawn(inner.run_avatar_loop(scope));
    }

    /// Consumes push notifications until the session ends
    ///
    /// Owns connection recovery: a lost wire is retried with the same
    /// cooldown policy as login, re-fetching the endpoint when the old one
    /// stops answering.
    async fn run_notification_loop(self: Arc<Self>, scope: CancellationToken) {
        debug!("notification loop started");
        loop {
            let event = tokio::select! {
                _ = scope.cancelled() => break,
                event = self.channel.poll() => event,
            };
            match event {
                Ok(notification) => self.dispatch_notification(notification).await,
                Err(ChannelError::Closed) => break,
                Err(error) => {
                    warn!(error = %error, "push connection lost");
                    self.emit(SessionEvent::ConnectionStatus {
                        connected: false,
                        still_trying: true,
                        last_error: Some(error.to_string()),
                    });
                    match self.recover_connection(&scope).await {
                        Recovery::Resumed => continue,
                        Recovery::Stopped => break,
                    }
                }
            }
            if scope.is_cancelled() {
                break;
            }
        }
        debug!("notification loop stopped");
    }

    /// Re-establishes the push connection after a loss
    async fn recover_connection(&self, scope: &CancellationToken) -> Recovery {
        // Transfer tasks die with the wire; the resync decides what
        // restarts. Status and pause flags survive untouched.
        let aborted = { self.model.lock().await.registry.reset_transfers() };
        for id in &aborted {
            self.engine.abort(*id).await;
        }

        loop {
            if scope.is_cancelled() {
                return Recovery::Stopped;
            }

            let reconnected = match self.channel.reconnect(None).await {
                Ok(()) => true,
                Err(ChannelError::Closed) => return Recovery::Stopped,
                Err(error) => {
                    warn!(error = %error, "reconnect failed, fetching a fresh endpoint");
                    match self.account.notification_endpoint().await {
                        Ok(endpoint) => {
                            let endpoint = self.endpoint_with_override(endpoint);
                            match self.channel.reconnect(Some(endpoint)).await {
                                Ok(()) => true,
                                Err(ChannelError::Closed) => return Recovery::Stopped,
                                Err(error) => {
                                    warn!(error = %error, "reconnect on fresh endpoint failed");
                                    false
                                }
                            }
                        }
                        Err(AccountError::InvalidCredentials) => {
                            self.kick_out("session invalidated while reconnecting").await;
                            return Recovery::Stopped;
                        }
                        Err(error) => {
                            warn!(error = %error, "endpoint fetch failed");
                            false
                        }
                    }
                }
            };

            if reconnected {
                match self.synchronize_and_publish(false).await {
                    Ok(()) => {
                        info!("push connection recovered");
                        return Recovery::Resumed;
                    }
                    Err(SyncFailure::Kicked(reason)) => {
                        self.kick_out(&reason).await;
                        return Recovery::Stopped;
                    }
                    Err(SyncFailure::Account(error)) => {
                        warn!(error = %error, "resynchronization failed");
                    }
                }
            }

            let pause = self.cooldown_with_jitter();
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = scope.cancelled() => return Recovery::Stopped,
            }
        }
    }

    /// Periodic keep-alive on the push connection
    ///
    /// Failures only get logged; the notification loop owns recovery.
    async fn run_heartbeat(self: Arc<Self>, scope: CancellationToken) {
        let period = Duration::from_secs(self.config.session.heartbeat_period_secs);
        let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = scope.cancelled() => break,
                _ = ticks.tick() => {}
            }
            if let Err(error) = self.channel.ping().await {
                debug!(error = %error, "keep-alive failed");
            }
        }
    }

    /// Downloads queued avatars one at a time
    async fn run_avatar_loop(self: Arc<Self>, scope: CancellationToken) {
        loop {
            let Some(id) = self.avatars.next() else {
                tokio::select! {
                    _ = scope.cancelled() => break,
                    _ = self.avatars.wait() => continue,
                }
            };
            if { self.model.lock().await.users.has_avatar(id) } {
                continue;
            }
            match self.account.icon(id).await {
                Ok(bytes) => {
                    self.model.lock().await.users.store_avatar(id, bytes);
                    self.emit(SessionEvent::AvatarAvailable { user_id: id });
                }
                Err(error) => {
                    debug!(user_id = %id, error = %error, "avatar download failed");
                }
            }
        }
    }
}

// ============================================================================
// Event emission
// ============================================================================

impl SessionInner {
    pub(crate) fn emit(&self, event: SessionEvent) {
        debug!(kind = event.kind_name(), "event");
        self.events.dispatch(&event);
    }

    pub(crate) fn emit_all(&self, events: Vec<SessionEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}
