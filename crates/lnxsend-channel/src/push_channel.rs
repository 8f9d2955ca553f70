//! Push connection over a pluggable transport
//!
//! [`PushChannel`] adapts a raw [`INotificationTransport`] wire into the
//! [`INotificationChannel`] port the session polls. Each established wire
//! is owned by a dedicated reader task; the channel hands out events
//! through an in-process queue, so `poll` and `ping` never contend on the
//! stream itself.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use lnxsend_core::domain::ids::{DeviceId, SessionId, UserId};
use lnxsend_core::ports::{
    ChannelError, Endpoint, INotificationChannel, INotificationStream, INotificationTransport,
    Notification,
};

type Fingerprint = [u8; 32];
type PollResult = Result<Notification, ChannelError>;
type PingReply = oneshot::Sender<Result<(), ChannelError>>;

/// Authentication triple presented on every dial of one session
#[derive(Debug, Clone, Copy)]
struct Credentials {
    user: UserId,
    device: DeviceId,
    session: SessionId,
}

// ============================================================================
// PushChannel
// ============================================================================

/// Push-connection adapter over an injected transport
///
/// ## Design Notes
///
/// - The server key is hashed and pinned on the first dial of a session;
///   every `reconnect` re-verifies the remote against that pin and refuses
///   the wire on mismatch. `connect` starts a fresh session and pins anew.
/// - Each established wire runs under its own reader task. The task
///   swallows transport artifacts (`ConnectionEnabled`, `Ping`,
///   `NetworkUpdate`), translates `Suicide` into a connection loss, and
///   forwards everything else into the event queue in wire order.
/// - The event queue is replaced on every dial, so events queued by a dead
///   wire never leak into the connection that follows it. The resync after
///   a reconnect supersedes anything such a queue could have carried.
pub struct PushChannel {
    transport: Arc<dyn INotificationTransport>,
    state: Mutex<ChannelState>,
    events: Mutex<Option<mpsc::UnboundedReceiver<PollResult>>>,
    connected: watch::Sender<bool>,
}

#[derive(Default)]
struct ChannelState {
    endpoint: Option<Endpoint>,
    auth: Option<Credentials>,
    fingerprint: Option<Fingerprint>,
    pings: Option<mpsc::Sender<PingReply>>,
    events_tx: Option<mpsc::UnboundedSender<PollResult>>,
    reader: Option<JoinHandle<()>>,
    closed: bool,
}

impl PushChannel {
    #[must_use]
    pub fn new(transport: Arc<dyn INotificationTransport>) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            transport,
            state: Mutex::new(ChannelState::default()),
            events: Mutex::new(None),
            connected,
        }
    }

    /// Dials the stored endpoint, verifies the pin and spawns the reader
    async fn establish(&self, state: &mut ChannelState) -> Result<(), ChannelError> {
        let endpoint = state.endpoint.clone().ok_or(ChannelError::NotConnected)?;
        let auth = state.auth.ok_or(ChannelError::NotConnected)?;

        let mut stream = self.transport.dial(&endpoint).await?;

        let digest: Fingerprint = Sha256::digest(stream.server_key()).into();
        match state.fingerprint {
            None => state.fingerprint = Some(digest),
            Some(pinned) if pinned == digest => {}
            Some(pinned) => {
                warn!(
                    endpoint = %endpoint,
                    "push endpoint presented an unexpected key, refusing connection"
                );
                return Err(ChannelError::FingerprintMismatch {
                    expected: hex(&pinned),
                    actual: hex(&digest),
                });
            }
        }

        stream
            .authenticate(auth.user, auth.device, auth.session)
            .await?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (ping_tx, ping_rx) = mpsc::channel(1);
        let reader = tokio::spawn(run_reader(
            stream,
            events_tx.clone(),
            ping_rx,
            self.connected.clone(),
        ));

        *self.events.lock().await = Some(events_rx);
        state.events_tx = Some(events_tx);
        state.pings = Some(ping_tx);
        state.reader = Some(reader);
        self.connected.send_replace(true);
        info!(endpoint = %endpoint, "push connection established");
        Ok(())
    }
}

impl ChannelState {
    /// Tears down the reader task, leaving credentials and pin untouched
    fn stop_reader(&mut self, connected: &watch::Sender<bool>) {
        self.pings = None;
        self.events_tx = None;
        if let Some(reader) = self.reader.take() {
            // Dropping the ping sender unblocks the task; abort covers a
            // reader wedged inside a transport call.
            reader.abort();
        }
        connected.send_replace(false);
    }
}

#[async_trait::async_trait]
impl INotificationChannel for PushChannel {
    async fn connect(
        &self,
        user: UserId,
        device: DeviceId,
        session: SessionId,
        endpoint: Endpoint,
    ) -> Result<(), ChannelError> {
        let mut state = self.state.lock().await;
        state.stop_reader(&self.connected);
        state.closed = false;
        state.fingerprint = None;
        state.auth = Some(Credentials {
            user,
            device,
            session,
        });
        state.endpoint = Some(endpoint);
        self.establish(&mut state).await
    }

    async fn wait_connected(&self) {
        let mut health = self.connected.subscribe();
        while !*health.borrow_and_update() {
            if health.changed().await.is_err() {
                return;
            }
        }
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    async fn poll(&self) -> Result<Notification, ChannelError> {
        let mut slot = self.events.lock().await;
        let events = slot.as_mut().ok_or(ChannelError::NotConnected)?;
        match events.recv().await {
            Some(event) => event,
            None => Err(ChannelError::Closed),
        }
    }

    async fn ping(&self) -> Result<(), ChannelError> {
        let pings = {
            let state = self.state.lock().await;
            if state.closed {
                return Err(ChannelError::Closed);
            }
            state.pings.clone().ok_or(ChannelError::NotConnected)?
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        if pings.send(reply_tx).await.is_err() {
            return Err(ChannelError::NotConnected);
        }
        match reply_rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ChannelError::ConnectionLost(
                "connection dropped during keep-alive".to_string(),
            )),
        }
    }

    async fn reconnect(&self, endpoint: Option<Endpoint>) -> Result<(), ChannelError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(ChannelError::Closed);
        }
        if state.auth.is_none() {
            return Err(ChannelError::NotConnected);
        }
        state.stop_reader(&self.connected);
        if let Some(endpoint) = endpoint {
            state.endpoint = Some(endpoint);
        }
        self.establish(&mut state).await
    }

    async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        // Queue the terminal event through the dying wire's sender first,
        // so a blocked poll wakes with Closed rather than hanging.
        if let Some(events_tx) = &state.events_tx {
            let _ = events_tx.send(Err(ChannelError::Closed));
        }
        state.stop_reader(&self.connected);
        state.closed = true;
        state.auth = None;
        state.endpoint = None;
        state.fingerprint = None;
        debug!("push connection torn down");
    }
}

// ============================================================================
// Reader task
// ============================================================================

/// Owns one established wire until it dies or the channel replaces it
async fn run_reader(
    mut stream: Box<dyn INotificationStream>,
    events: mpsc::UnboundedSender<PollResult>,
    mut pings: mpsc::Receiver<PingReply>,
    connected: watch::Sender<bool>,
) {
    loop {
        // A ping race drops the in-flight next() future; transports must
        // keep partial frames buffered internally.
        tokio::select! {
            reply = pings.recv() => match reply {
                Some(reply) => {
                    let outcome = stream.ping().await;
                    let _ = reply.send(outcome);
                }
                None => break,
            },
            event = stream.next() => match event {
                Ok(Notification::ConnectionEnabled) => {
                    debug!("push handshake acknowledged");
                }
                Ok(Notification::Ping) => {
                    debug!("keep-alive received");
                }
                Ok(Notification::NetworkUpdate { .. }) => {
                    debug!("ignoring legacy network broadcast");
                }
                Ok(Notification::Suicide) => {
                    warn!("server ordered connection shutdown");
                    connected.send_replace(false);
                    let _ = events.send(Err(ChannelError::ConnectionLost(
                        "server ordered connection shutdown".to_string(),
                    )));
                    break;
                }
                Ok(notification) => {
                    debug!(kind = notification.kind_name(), "notification received");
                    if events.send(Ok(notification)).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    connected.send_replace(false);
                    let _ = events.send(Err(error));
                    break;
                }
            },
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

// ============================================================================
// Tests
// ============================================================================
