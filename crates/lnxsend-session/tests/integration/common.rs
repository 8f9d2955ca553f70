//! Shared fixtures and port fakes for the session integration tests
//!
//! Every test builds a [`Harness`]: one [`Session`] wired to scriptable
//! in-memory fakes of its four collaborator ports, a tempdir as the
//! storage home, and an event log collecting everything the session
//! emits. The fakes record each call so tests can assert on the traffic
//! the session generated.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex as AsyncMutex, Notify};

use lnxsend_core::config::Config;
use lnxsend_core::domain::device::Device;
use lnxsend_core::domain::ids::{DeviceId, SessionId, TransactionId, UserId};
use lnxsend_core::domain::status::TransactionStatus;
use lnxsend_core::domain::transaction::TransactionRecord;
use lnxsend_core::domain::user::User;
use lnxsend_core::ports::{
    AccountError, ChannelError, Endpoint, IAccountService, IIdentityStore, INotificationChannel,
    ITransferEngine, IdentityError, LoginResponse, Notification, PhaseSink, SynchronizeSnapshot,
    TransferError, TransferOutcome, TransferPhase,
};
use lnxsend_session::{Session, SessionEvent};

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub session: Session,
    pub account: Arc<FakeAccountService>,
    pub channel: Arc<FakeChannel>,
    pub engine: Arc<FakeTransferEngine>,
    pub identity: Arc<FakeIdentityStore>,
    pub events: EventLog,
    /// Storage home; dropped with the harness
    pub home: tempfile::TempDir,
}

pub fn harness() -> Harness {
    harness_with(|_| {})
}

/// Builds a session around fresh fakes, with `tweak` applied to the
/// default configuration first
pub fn harness_with(tweak: impl FnOnce(&mut Config)) -> Harness {
    let home = tempfile::tempdir().expect("tempdir");
    let mut config = Config::default();
    config.storage.home_dir = home.path().to_path_buf();
    config.device.name = "test-device".to_string();
    tweak(&mut config);

    let account = Arc::new(FakeAccountService::new());
    let channel = Arc::new(FakeChannel::new());
    let engine = Arc::new(FakeTransferEngine::default());
    let identity = Arc::new(FakeIdentityStore::default());
    let session = Session::new(
        config,
        account.clone(),
        channel.clone(),
        engine.clone(),
        identity.clone(),
    );

    let events = EventLog::default();
    let sink = events.clone();
    session.on_event(move |event| sink.push(event.clone()));

    Harness {
        session,
        account,
        channel,
        engine,
        identity,
        events,
        home,
    }
}

/// Logs the fixture account in and panics on any failure
pub async fn login_ok(harness: &Harness) {
    harness
        .session
        .login("alice@example.com", "hunter2")
        .await
        .expect("login failed");
}

/// Polls `predicate` every 10ms until it holds, panicking after 5s
pub async fn wait_until<F>(what: &str, mut predicate: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !predicate() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Writes zero-filled sample files and returns their paths
pub fn stage_files(dir: &Path, specs: &[(&str, usize)]) -> Vec<String> {
    specs
        .iter()
        .map(|(name, size)| {
            let path = dir.join(name);
            std::fs::write(&path, vec![0u8; *size]).expect("stage sample file");
            path.to_string_lossy().into_owned()
        })
        .collect()
}

// ============================================================================
// Event log
// ============================================================================

/// Collects every event the session emits, in order
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl EventLog {
    fn push(&self, event: SessionEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn all(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.all()
            .iter()
            .filter(|event| event.kind_name() == kind)
            .count()
    }

    pub fn contains(&self, event: &SessionEvent) -> bool {
        self.all().iter().any(|seen| seen == event)
    }
}

/// The statuses one transaction was announced moving through
pub fn status_trail(events: &EventLog, id: TransactionId) -> Vec<TransactionStatus> {
    events
        .all()
        .iter()
        .filter_map(|event| match event {
            SessionEvent::StatusChanged {
                transaction_id,
                status,
                ..
            } if *transaction_id == id => Some(*status),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Record builders
// ============================================================================

/// A peer offer from `sender` to the fixture account, awaiting a decision
pub fn incoming_offer(account: &FakeAccountService, sender: &User) -> TransactionRecord {
    let mut record = TransactionRecord::new_peer(
        TransactionId::new(),
        sender.id,
        DeviceId::new(),
        account.self_user().id,
        vec!["report.pdf".to_string()],
        2048,
        "for review",
    );
    record.status = TransactionStatus::WaitingAccept;
    record
}

/// A peer offer from the fixture account's own device, at `status`
pub fn outgoing_offer(
    account: &FakeAccountService,
    recipient: &User,
    status: TransactionStatus,
) -> TransactionRecord {
    let mut record = TransactionRecord::new_peer(
        TransactionId::new(),
        account.self_user().id,
        account.device_id(),
        recipient.id,
        vec!["archive.tar".to_string()],
        4096,
        "",
    );
    record.status = status;
    record
}

/// A link transaction owned by another device of the fixture account
pub fn shared_link(account: &FakeAccountService) -> TransactionRecord {
    let mut record = TransactionRecord::new_link(
        TransactionId::new(),
        account.self_user().id,
        DeviceId::new(),
        vec!["slides.pdf".to_string()],
        1024,
        "",
        "https://lnk.example/abc123",
    );
    record.status = TransactionStatus::CloudBuffered;
    record
}

// ============================================================================
// FakeAccountService
// ============================================================================

#[derive(Clone)]
pub struct CreateCall {
    pub recipient: String,
    pub files: Vec<String>,
    pub total_size: u64,
    pub message: String,
}

enum RecipientScript {
    Ghost,
    Registered(User),
}

struct AccountState {
    self_user: User,
    session_id: SessionId,
    endpoint: Endpoint,
    features: HashMap<String, String>,
    login_failures: VecDeque<AccountError>,
    hold_logins: bool,
    login_gate: Option<Arc<Notify>>,
    login_calls: u32,
    swaggers: Vec<User>,
    drop_self_device: bool,
    running_transactions: Vec<TransactionRecord>,
    final_transactions: Vec<TransactionRecord>,
    link_transactions: Vec<TransactionRecord>,
    sync_calls: u32,
    directory: HashMap<UserId, User>,
    user_calls: u32,
    icons: HashMap<UserId, Vec<u8>>,
    creates: Vec<CreateCall>,
    recipient_script: RecipientScript,
    update_failures: VecDeque<AccountError>,
    updates: Vec<(TransactionId, TransactionStatus)>,
    ghost_code_failures: HashMap<String, VecDeque<AccountError>>,
    used_codes: Vec<String>,
    endpoint_failures: VecDeque<AccountError>,
    endpoint_fetches: u32,
    logout_calls: u32,
    hang_logout: bool,
}

/// Scriptable in-memory stand-in for the account backend
///
/// Successful answers are built from a fixed fixture account; failures
/// are queued per method and consumed one call at a time.
pub struct FakeAccountService {
    device_id: DeviceId,
    state: Mutex<AccountState>,
}

impl FakeAccountService {
    pub fn new() -> Self {
        Self {
            device_id: DeviceId::new(),
            state: Mutex::new(AccountState {
                self_user: User::new(UserId::new(), "Alice Tester", "alice"),
                session_id: SessionId::new(),
                endpoint: Endpoint::new("127.0.0.1", 4747),
                features: HashMap::new(),
                login_failures: VecDeque::new(),
                hold_logins: false,
                login_gate: None,
                login_calls: 0,
                swaggers: Vec::new(),
                drop_self_device: false,
                running_transactions: Vec::new(),
                final_transactions: Vec::new(),
                link_transactions: Vec::new(),
                sync_calls: 0,
                directory: HashMap::new(),
                user_calls: 0,
                icons: HashMap::new(),
                creates: Vec::new(),
                recipient_script: RecipientScript::Ghost,
                update_failures: VecDeque::new(),
                updates: Vec::new(),
                ghost_code_failures: HashMap::new(),
                used_codes: Vec::new(),
                endpoint_failures: VecDeque::new(),
                endpoint_fetches: 0,
                logout_calls: 0,
                hang_logout: false,
            }),
        }
    }

    /// The id the server registers this device under
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn self_user(&self) -> User {
        self.state.lock().unwrap().self_user.clone()
    }

    pub fn session_id(&self) -> SessionId {
        self.state.lock().unwrap().session_id
    }

    pub fn script_login_failure(&self, error: AccountError) {
        self.state.lock().unwrap().login_failures.push_back(error);
    }

    /// Makes every login call block forever after being recorded
    pub fn hold_logins(&self) {
        self.state.lock().unwrap().hold_logins = true;
    }

    /// Makes every login call block after being recorded until the
    /// returned gate is notified
    pub fn gate_logins(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().unwrap().login_gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn login_calls(&self) -> u32 {
        self.state.lock().unwrap().login_calls
    }

    pub fn set_swaggers(&self, users: Vec<User>) {
        self.state.lock().unwrap().swaggers = users;
    }

    /// Makes the next snapshots omit this device from the device list
    pub fn drop_self_device(&self) {
        self.state.lock().unwrap().drop_self_device = true;
    }

    pub fn set_running_transactions(&self, records: Vec<TransactionRecord>) {
        self.state.lock().unwrap().running_transactions = records;
    }

    pub fn set_final_transactions(&self, records: Vec<TransactionRecord>) {
        self.state.lock().unwrap().final_transactions = records;
    }

    pub fn set_link_transactions(&self, records: Vec<TransactionRecord>) {
        self.state.lock().unwrap().link_transactions = records;
    }

    pub fn sync_calls(&self) -> u32 {
        self.state.lock().unwrap().sync_calls
    }

    pub fn add_user(&self, user: User) {
        self.state.lock().unwrap().directory.insert(user.id, user);
    }

    pub fn user_calls(&self) -> u32 {
        self.state.lock().unwrap().user_calls
    }

    pub fn set_icon(&self, id: UserId, bytes: Vec<u8>) {
        self.state.lock().unwrap().icons.insert(id, bytes);
    }

    /// Makes created transactions address `user` as a registered recipient
    pub fn script_peer_recipient(&self, user: &User) {
        self.state.lock().unwrap().recipient_script = RecipientScript::Registered(user.clone());
    }

    pub fn creates(&self) -> Vec<CreateCall> {
        self.state.lock().unwrap().creates.clone()
    }

    pub fn script_update_failure(&self, error: AccountError) {
        self.state.lock().unwrap().update_failures.push_back(error);
    }

    pub fn updates(&self) -> Vec<(TransactionId, TransactionStatus)> {
        self.state.lock().unwrap().updates.clone()
    }

    /// Queues one failure for the next redemption of `code`
    pub fn script_ghost_code_failure(&self, code: &str, error: AccountError) {
        self.state
            .lock()
            .unwrap()
            .ghost_code_failures
            .entry(code.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn used_codes(&self) -> Vec<String> {
        self.state.lock().unwrap().used_codes.clone()
    }

    pub fn script_endpoint_failure(&self, error: AccountError) {
        self.state.lock().unwrap().endpoint_failures.push_back(error);
    }

    pub fn endpoint_fetches(&self) -> u32 {
        self.state.lock().unwrap().endpoint_fetches
    }

    pub fn logout_calls(&self) -> u32 {
        self.state.lock().unwrap().logout_calls
    }

    /// Makes every logout call block forever after being recorded
    pub fn hang_logout(&self) {
        self.state.lock().unwrap().hang_logout = true;
    }
}

#[async_trait::async_trait]
impl IAccountService for FakeAccountService {
    async fn login(
        &self,
        _email: &str,
        _password: &str,
        device: &Device,
    ) -> Result<LoginResponse, AccountError> {
        let (hold, gate, result) = {
            let mut state = self.state.lock().unwrap();
            state.login_calls += 1;
            let result = match state.login_failures.pop_front() {
                Some(error) => Err(error),
                None => Ok(LoginResponse {
                    self_user: state.self_user.clone(),
                    device: Device::new(self.device_id, &device.name)
                        .with_passport("passport-blob"),
                    identity: "encrypted-identity".to_string(),
                    features: state.features.clone(),
                    notification_endpoint: state.endpoint.clone(),
                    session_id: state.session_id,
                }),
            };
            (state.hold_logins, state.login_gate.clone(), result)
        };
        if hold {
            std::future::pending::<()>().await;
        }
        if let Some(gate) = gate {
            gate.notified().await;
        }
        result
    }

    async fn synchronize(&self, _full: bool) -> Result<SynchronizeSnapshot, AccountError> {
        let mut state = self.state.lock().unwrap();
        state.sync_calls += 1;
        let mut devices = Vec::new();
        if !state.drop_self_device {
            devices.push(Device::new(self.device_id, "test-device").with_passport("passport-blob"));
        }
        Ok(SynchronizeSnapshot {
            self_user: state.self_user.clone(),
            devices,
            external_accounts: Vec::new(),
            swaggers: state.swaggers.clone(),
            running_transactions: state.running_transactions.clone(),
            final_transactions: state.final_transactions.clone(),
            link_transactions: state.link_transactions.clone(),
        })
    }

    async fn create_transaction(
        &self,
        recipient: &str,
        files: &[String],
        total_size: u64,
        message: &str,
    ) -> Result<TransactionRecord, AccountError> {
        let mut state = self.state.lock().unwrap();
        state.creates.push(CreateCall {
            recipient: recipient.to_string(),
            files: files.to_vec(),
            total_size,
            message: message.to_string(),
        });
        let (recipient_id, is_ghost) = match &state.recipient_script {
            RecipientScript::Registered(user) => (user.id, false),
            RecipientScript::Ghost => (UserId::new(), true),
        };
        let mut record = TransactionRecord::new_peer(
            TransactionId::new(),
            state.self_user.id,
            self.device_id,
            recipient_id,
            files.to_vec(),
            total_size,
            message,
        );
        record.is_ghost = is_ghost;
        Ok(record)
    }

    async fn create_link(
        &self,
        files: &[String],
        total_size: u64,
        message: &str,
    ) -> Result<TransactionRecord, AccountError> {
        let mut state = self.state.lock().unwrap();
        state.creates.push(CreateCall {
            recipient: String::new(),
            files: files.to_vec(),
            total_size,
            message: message.to_string(),
        });
        let id = TransactionId::new();
        Ok(TransactionRecord::new_link(
            id,
            state.self_user.id,
            self.device_id,
            files.to_vec(),
            total_size,
            message,
            format!("https://lnk.example/{id}"),
        ))
    }

    async fn update_transaction(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<(), AccountError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.update_failures.pop_front() {
            return Err(error);
        }
        state.updates.push((id, status));
        Ok(())
    }

    async fn user(&self, id: UserId) -> Result<User, AccountError> {
        let mut state = self.state.lock().unwrap();
        state.user_calls += 1;
        state
            .directory
            .get(&id)
            .cloned()
            .ok_or_else(|| AccountError::NotFound(id.to_string()))
    }

    async fn icon(&self, id: UserId) -> Result<Vec<u8>, AccountError> {
        self.state
            .lock()
            .unwrap()
            .icons
            .get(&id)
            .cloned()
            .ok_or_else(|| AccountError::NotFound(id.to_string()))
    }

    async fn use_ghost_code(&self, code: &str) -> Result<(), AccountError> {
        let mut state = self.state.lock().unwrap();
        state.used_codes.push(code.to_string());
        match state
            .ghost_code_failures
            .get_mut(code)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn notification_endpoint(&self) -> Result<Endpoint, AccountError> {
        let mut state = self.state.lock().unwrap();
        state.endpoint_fetches += 1;
        match state.endpoint_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(state.endpoint.clone()),
        }
    }

    async fn logout(&self) -> Result<(), AccountError> {
        let hang = {
            let mut state = self.state.lock().unwrap();
            state.logout_calls += 1;
            state.hang_logout
        };
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

// ============================================================================
// FakeChannel
// ============================================================================

#[derive(Clone)]
pub struct ConnectCall {
    pub user: UserId,
    pub device: DeviceId,
    pub session: SessionId,
    pub endpoint: Endpoint,
}

struct ChannelState {
    tx: mpsc::UnboundedSender<Result<Notification, ChannelError>>,
    connects: Vec<ConnectCall>,
    connect_failures: VecDeque<ChannelError>,
    reconnects: Vec<Option<Endpoint>>,
    reconnect_failures: VecDeque<ChannelError>,
    pings: u32,
    disconnects: u32,
}

/// Scriptable in-memory stand-in for the push connection
///
/// Tests feed the wire through [`push`] and [`fail_connection`]; the
/// session drains it through the port's `poll`.
///
/// [`push`]: FakeChannel::push
/// [`fail_connection`]: FakeChannel::fail_connection
pub struct FakeChannel {
    state: Mutex<ChannelState>,
    feed: AsyncMutex<mpsc::UnboundedReceiver<Result<Notification, ChannelError>>>,
    connected: watch::Sender<bool>,
}

impl FakeChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (connected, _) = watch::channel(false);
        Self {
            state: Mutex::new(ChannelState {
                tx,
                connects: Vec::new(),
                connect_failures: VecDeque::new(),
                reconnects: Vec::new(),
                reconnect_failures: VecDeque::new(),
                pings: 0,
                disconnects: 0,
            }),
            feed: AsyncMutex::new(rx),
            connected,
        }
    }

    /// Delivers one server-initiated event to the session
    pub fn push(&self, notification: Notification) {
        let _ = self.state.lock().unwrap().tx.send(Ok(notification));
    }

    /// Makes the next poll fail as a dropped wire
    pub fn fail_connection(&self, error: ChannelError) {
        let _ = self.state.lock().unwrap().tx.send(Err(error));
    }

    pub fn connects(&self) -> Vec<ConnectCall> {
        self.state.lock().unwrap().connects.clone()
    }

    pub fn script_connect_failure(&self, error: ChannelError) {
        self.state.lock().unwrap().connect_failures.push_back(error);
    }

    pub fn reconnects(&self) -> Vec<Option<Endpoint>> {
        self.state.lock().unwrap().reconnects.clone()
    }

    pub fn script_reconnect_failure(&self, error: ChannelError) {
        self.state
            .lock()
            .unwrap()
            .reconnect_failures
            .push_back(error);
    }

    pub fn pings(&self) -> u32 {
        self.state.lock().unwrap().pings
    }

    pub fn disconnects(&self) -> u32 {
        self.state.lock().unwrap().disconnects
    }
}

#[async_trait::async_trait]
impl INotificationChannel for FakeChannel {
    async fn connect(
        &self,
        user: UserId,
        device: DeviceId,
        session: SessionId,
        endpoint: Endpoint,
    ) -> Result<(), ChannelError> {
        let mut state = self.state.lock().unwrap();
        state.connects.push(ConnectCall {
            user,
            device,
            session,
            endpoint,
        });
        if let Some(error) = state.connect_failures.pop_front() {
            return Err(error);
        }
        self.connected.send_replace(true);
        Ok(())
    }

    async fn wait_connected(&self) {
        let mut rx = self.connected.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    async fn poll(&self) -> Result<Notification, ChannelError> {
        let mut feed = self.feed.lock().await;
        match feed.recv().await {
            Some(item) => item,
            None => Err(ChannelError::Closed),
        }
    }

    async fn ping(&self) -> Result<(), ChannelError> {
        self.state.lock().unwrap().pings += 1;
        Ok(())
    }

    async fn reconnect(&self, endpoint: Option<Endpoint>) -> Result<(), ChannelError> {
        let mut state = self.state.lock().unwrap();
        state.reconnects.push(endpoint);
        if let Some(error) = state.reconnect_failures.pop_front() {
            return Err(error);
        }
        self.connected.send_replace(true);
        Ok(())
    }

    async fn disconnect(&self) {
        self.state.lock().unwrap().disconnects += 1;
        self.connected.send_replace(false);
    }
}

// ============================================================================
// FakeTransferEngine
// ============================================================================

/// What one engine run should report and return
#[derive(Clone)]
pub struct TransferScript {
    pub phases: Vec<TransferPhase>,
    pub outcome: Result<TransferOutcome, TransferError>,
    /// When set, the run blocks after its phases until notified
    pub gate: Option<Arc<Notify>>,
}

impl Default for TransferScript {
    fn default() -> Self {
        Self {
            phases: vec![TransferPhase::Transferring],
            outcome: Ok(TransferOutcome::Finished),
            gate: None,
        }
    }
}

#[derive(Default)]
struct EngineState {
    scripts: HashMap<TransactionId, TransferScript>,
    default_script: TransferScript,
    runs: Vec<TransactionId>,
    aborts: Vec<TransactionId>,
    pauses: Vec<(TransactionId, bool)>,
    progress: HashMap<TransactionId, f64>,
}

/// Scriptable in-memory stand-in for the transfer engine
///
/// Runs replay the script for their transaction (or the default one),
/// reporting the scripted phases and returning the scripted outcome.
#[derive(Default)]
pub struct FakeTransferEngine {
    state: Mutex<EngineState>,
}

impl FakeTransferEngine {
    pub fn script(&self, id: TransactionId, script: TransferScript) {
        self.state.lock().unwrap().scripts.insert(id, script);
    }

    pub fn set_default_script(
        &self,
        phases: Vec<TransferPhase>,
        outcome: Result<TransferOutcome, TransferError>,
    ) {
        self.state.lock().unwrap().default_script = TransferScript {
            phases,
            outcome,
            gate: None,
        };
    }

    /// Makes every unscripted run report `phases` then block until the
    /// returned gate is notified, finishing successfully afterwards
    pub fn hold_default(&self, phases: Vec<TransferPhase>) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().unwrap().default_script = TransferScript {
            phases,
            outcome: Ok(TransferOutcome::Finished),
            gate: Some(Arc::clone(&gate)),
        };
        gate
    }

    pub fn runs(&self) -> Vec<TransactionId> {
        self.state.lock().unwrap().runs.clone()
    }

    pub fn aborts(&self) -> Vec<TransactionId> {
        self.state.lock().unwrap().aborts.clone()
    }

    pub fn pauses(&self) -> Vec<(TransactionId, bool)> {
        self.state.lock().unwrap().pauses.clone()
    }

    pub fn set_progress(&self, id: TransactionId, value: f64) {
        self.state.lock().unwrap().progress.insert(id, value);
    }
}

#[async_trait::async_trait]
impl ITransferEngine for FakeTransferEngine {
    async fn run(
        &self,
        record: &TransactionRecord,
        phases: &PhaseSink,
    ) -> Result<TransferOutcome, TransferError> {
        let script = {
            let mut state = self.state.lock().unwrap();
            state.runs.push(record.id);
            state
                .scripts
                .get(&record.id)
                .cloned()
                .unwrap_or_else(|| state.default_script.clone())
        };
        for phase in &script.phases {
            phases(*phase);
        }
        if let Some(gate) = &script.gate {
            gate.notified().await;
        }
        script.outcome
    }

    async fn pause(&self, id: TransactionId, enabled: bool) -> Result<(), TransferError> {
        self.state.lock().unwrap().pauses.push((id, enabled));
        Ok(())
    }

    async fn abort(&self, id: TransactionId) {
        self.state.lock().unwrap().aborts.push(id);
    }

    async fn progress(&self, id: TransactionId) -> Result<f64, TransferError> {
        self.state
            .lock()
            .unwrap()
            .progress
            .get(&id)
            .copied()
            .ok_or_else(|| TransferError::Internal("no progress tracked".to_string()))
    }
}

// ============================================================================
// FakeIdentityStore
// ============================================================================

#[derive(Default)]
struct IdentityState {
    unlock_failures: VecDeque<IdentityError>,
    unlocks: Vec<UserId>,
    persists: Vec<(UserId, String)>,
    clears: u32,
}

/// Recording stand-in for the credential store
#[derive(Default)]
pub struct FakeIdentityStore {
    state: Mutex<IdentityState>,
}

impl FakeIdentityStore {
    pub fn script_unlock_failure(&self, error: IdentityError) {
        self.state.lock().unwrap().unlock_failures.push_back(error);
    }

    pub fn unlocks(&self) -> Vec<UserId> {
        self.state.lock().unwrap().unlocks.clone()
    }

    /// The (user, passport) pairs handed over for persistence
    pub fn persists(&self) -> Vec<(UserId, String)> {
        self.state.lock().unwrap().persists.clone()
    }

    pub fn clears(&self) -> u32 {
        self.state.lock().unwrap().clears
    }
}

#[async_trait::async_trait]
impl IIdentityStore for FakeIdentityStore {
    async fn unlock(
        &self,
        user: UserId,
        _encrypted_identity: &str,
        _password: &str,
    ) -> Result<(), IdentityError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.unlock_failures.pop_front() {
            return Err(error);
        }
        state.unlocks.push(user);
        Ok(())
    }

    async fn persist(
        &self,
        user: UserId,
        _identity: &str,
        passport: &str,
    ) -> Result<(), IdentityError> {
        self.state
            .lock()
            .unwrap()
            .persists
            .push((user, passport.to_string()));
        Ok(())
    }

    async fn clear(&self) {
        self.state.lock().unwrap().clears += 1;
    }
}
