//! Notification channel port (driven/secondary port)
//!
//! This module defines how the engine consumes the persistent push
//! connection: the closed set of server-initiated events, the channel
//! trait the session polls, and the transport trait the channel adapter
//! dials through.
//!
//! ## Design Notes
//!
//! - [`Notification`] is a closed tagged union over every event kind the
//!   wire can carry. The dispatcher matches it exhaustively, so a new kind
//!   without a handler fails to build.
//! - Four kinds are transport or legacy artifacts that the adapter must
//!   consume itself (`ConnectionEnabled`, `Ping`, `NetworkUpdate`,
//!   `Suicide`); the dispatcher treats their arrival as a logic error.
//! - The channel reports health through a connected latch rather than
//!   callbacks, so a waiter can block on "connected" without racing the
//!   connection attempt.

use serde_json::Value;
use thiserror::Error;

use super::account_service::Endpoint;
use crate::domain::ids::{DeviceId, SessionId, TransactionId, UserId};
use crate::domain::transaction::TransactionRecord;
use crate::domain::user::User;

// ============================================================================
// Notification
// ============================================================================

/// A server-initiated event delivered over the push connection
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Partial runtime-configuration patch
    ConfigurationUpdate { patch: Value },
    /// One device of a contact went on- or offline
    UserStatus {
        user_id: UserId,
        device_id: DeviceId,
        online: bool,
    },
    /// Fresh server copy of a link transaction
    LinkTransactionUpdate { record: TransactionRecord },
    /// Fresh server copy of a peer transaction
    PeerTransactionUpdate { record: TransactionRecord },
    /// A new contact relationship appeared
    NewSwagger { user: User },
    /// A contact relationship was severed
    DeletedSwagger { user_id: UserId },
    /// A favorite was removed on another device
    DeletedFavorite { user_id: UserId },
    /// Reachability change for the peer of a running transaction
    PeerReachability {
        transaction_id: TransactionId,
        reachable: bool,
        endpoints: Vec<Endpoint>,
    },
    /// The RPC session died server-side; the client must log out
    InvalidCredentials,
    /// Partial patch of the self-user/device aggregate
    ModelUpdate { patch: Value },
    /// The peer paused or resumed a running transfer
    TransferPaused {
        transaction_id: TransactionId,
        paused: bool,
    },
    /// Free-form text from another account
    DirectMessage { sender_id: UserId, message: String },

    // -- transport artifacts, consumed by the adapter, never dispatched --
    /// Connection handshake acknowledgement
    ConnectionEnabled,
    /// Keep-alive probe
    Ping,
    /// Legacy network topology broadcast
    NetworkUpdate { patch: Value },
    /// Server-ordered shutdown of the wire
    Suicide,
}

impl Notification {
    /// Returns the kind name as a string, for logging
    pub fn kind_name(&self) -> &'static str {
        match self {
            Notification::ConfigurationUpdate { .. } => "configuration_update",
            Notification::UserStatus { .. } => "user_status",
            Notification::LinkTransactionUpdate { .. } => "link_transaction_update",
            Notification::PeerTransactionUpdate { .. } => "peer_transaction_update",
            Notification::NewSwagger { .. } => "new_swagger",
            Notification::DeletedSwagger { .. } => "deleted_swagger",
            Notification::DeletedFavorite { .. } => "deleted_favorite",
            Notification::PeerReachability { .. } => "peer_reachability",
            Notification::InvalidCredentials => "invalid_credentials",
            Notification::ModelUpdate { .. } => "model_update",
            Notification::TransferPaused { .. } => "transfer_paused",
            Notification::DirectMessage { .. } => "direct_message",
            Notification::ConnectionEnabled => "connection_enabled",
            Notification::Ping => "ping",
            Notification::NetworkUpdate { .. } => "network_update",
            Notification::Suicide => "suicide",
        }
    }
}

// ============================================================================
// ChannelError
// ============================================================================

/// Failures surfaced by the push connection
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Operation requires an established connection
    #[error("channel is not connected")]
    NotConnected,

    /// The wire dropped; reconnection may succeed
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The remote presented a key that does not match the pinned one
    #[error("endpoint fingerprint mismatch (expected {expected}, got {actual})")]
    FingerprintMismatch { expected: String, actual: String },

    /// The server refused the authentication triple
    #[error("channel handshake rejected: {0}")]
    HandshakeRejected(String),

    /// Deliberately disconnected; polling must stop
    #[error("channel closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// INotificationChannel trait
// ============================================================================

/// Port trait for the push connection, as the session consumes it
///
/// ## Implementation Notes
///
/// - `connect` establishes and authenticates the wire, then opens the
///   connected latch. `wait_connected` blocks on that latch.
/// - `poll` yields exactly one dispatchable [`Notification`] per call, in
///   wire order. Transport artifacts never surface here.
/// - `reconnect` re-dials (optionally a fresh endpoint) and verifies the
///   remote key against the fingerprint pinned at first connect.
/// - `disconnect` is idempotent and makes any blocked `poll` return
///   [`ChannelError::Closed`].
#[async_trait::async_trait]
pub trait INotificationChannel: Send + Sync {
    /// Establishes the push connection for one session
    async fn connect(
        &self,
        user: UserId,
        device: DeviceId,
        session: SessionId,
        endpoint: Endpoint,
    ) -> Result<(), ChannelError>;

    /// Blocks until the connected latch is open
    async fn wait_connected(&self);

    /// Current connection health
    fn is_connected(&self) -> bool;

    /// Waits for the next server-initiated event
    async fn poll(&self) -> Result<Notification, ChannelError>;

    /// Sends one keep-alive probe
    async fn ping(&self) -> Result<(), ChannelError>;

    /// Re-dials after a lost connection, verifying the pinned fingerprint
    ///
    /// # Arguments
    /// * `endpoint` - A freshly fetched endpoint, or `None` to reuse the
    ///   last one
    async fn reconnect(&self, endpoint: Option<Endpoint>) -> Result<(), ChannelError>;

    /// Tears the wire down and closes the connected latch
    async fn disconnect(&self);
}

// ============================================================================
// Transport traits
// ============================================================================

/// Dials the raw wire under the channel adapter
#[async_trait::async_trait]
pub trait INotificationTransport: Send + Sync {
    async fn dial(&self, endpoint: &Endpoint) -> Result<Box<dyn INotificationStream>, ChannelError>;
}

/// One established wire
#[async_trait::async_trait]
pub trait INotificationStream: Send {
    /// Identity material presented by the remote end, as pinned bytes
    fn server_key(&self) -> &[u8];

    /// Presents the authentication triple
    async fn authenticate(
        &mut self,
        user: UserId,
        device: DeviceId,
        session: SessionId,
    ) -> Result<(), ChannelError>;

    /// Reads the next event off the wire
    async fn next(&mut self) -> Result<Notification, ChannelError>;

    /// Writes one keep-alive probe
    async fn ping(&mut self) -> Result<(), ChannelError>;
}
