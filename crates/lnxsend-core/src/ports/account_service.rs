//! Account service port (driven/secondary port)
//!
//! This module defines the stateless RPC surface of the account backend:
//! authentication, the full synchronization snapshot, transaction
//! bookkeeping, user lookup and avatar download, ghost codes, and the push
//! endpoint. The wire encoding is the adapter's business; the engine only
//! sees these shapes.
//!
//! ## Design Notes
//!
//! - Every method returns a typed [`AccountError`]; the session decides
//!   whether a failure is worth retrying via
//!   [`AccountError::is_permanent_login_failure`].
//! - `synchronize(full = true)` replaces all cached model state; partial
//!   synchronization is a server-side optimization and carries the same
//!   shape.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::device::Device;
use crate::domain::ids::{SessionId, TransactionId, UserId};
use crate::domain::status::TransactionStatus;
use crate::domain::transaction::TransactionRecord;
use crate::domain::user::{ExternalAccount, User};

// ============================================================================
// Endpoint
// ============================================================================

/// A host/port pair handed out by the account service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ============================================================================
// Login response
// ============================================================================

/// Everything a successful login hands back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// The authenticated account
    pub self_user: User,
    /// This device, as registered server-side (carries the passport)
    pub device: Device,
    /// Encrypted identity blob, unlocked with the account password
    pub identity: String,
    /// Feature flags merged into the runtime configuration
    pub features: HashMap<String, String>,
    /// Where the push connection should be established
    pub notification_endpoint: Endpoint,
    /// Correlates the push connection with this RPC session
    pub session_id: SessionId,
}

// ============================================================================
// Synchronize snapshot
// ============================================================================

/// The full model state as the server sees it
///
/// Ephemeral: consumed by one resync pass, fully replacing the cached
/// account, device list, external accounts and contact set. Transactions
/// are merged rather than replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynchronizeSnapshot {
    pub self_user: User,
    pub devices: Vec<Device>,
    pub external_accounts: Vec<ExternalAccount>,
    /// Contact relationships ("swaggers")
    pub swaggers: Vec<User>,
    /// Transactions the server still considers open
    pub running_transactions: Vec<TransactionRecord>,
    /// Recently finalized transactions, for history
    pub final_transactions: Vec<TransactionRecord>,
    pub link_transactions: Vec<TransactionRecord>,
}

// ============================================================================
// AccountError
// ============================================================================

/// Failures surfaced by the account service
///
/// The first six variants are permanent login failures: retrying cannot
/// succeed without different input, so the session surfaces them
/// immediately. Everything else is presumed transient.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email address not confirmed")]
    UnconfirmedEmail,

    #[error("protocol version rejected by server")]
    VersionRejected,

    #[error("device already logged in")]
    AlreadyLoggedIn,

    #[error("missing or invalid email address: {0}")]
    InvalidEmail(String),

    #[error("email address already registered: {0}")]
    EmailAlreadyRegistered(String),

    /// use_ghost_code on a code some account already consumed
    #[error("ghost code already used")]
    CodeAlreadyUsed,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("server error: {0}")]
    Server(String),
}

impl AccountError {
    /// Returns true if retrying a login with the same input cannot succeed
    pub fn is_permanent_login_failure(&self) -> bool {
        matches!(
            self,
            AccountError::InvalidCredentials
                | AccountError::UnconfirmedEmail
                | AccountError::VersionRejected
                | AccountError::AlreadyLoggedIn
                | AccountError::InvalidEmail(_)
                | AccountError::EmailAlreadyRegistered(_)
        )
    }
}

// ============================================================================
// IAccountService trait
// ============================================================================

/// Port trait for the account backend RPC surface
///
/// Implementations are stateless from the engine's point of view: each
/// call stands alone, the server tracks the RPC session through its own
/// transport-level means.
#[async_trait::async_trait]
pub trait IAccountService: Send + Sync {
    /// Authenticates and registers this device for the session
    ///
    /// # Arguments
    /// * `email` - Account email address
    /// * `password` - Account password, in the clear (hashing is the
    ///   adapter's concern)
    /// * `device` - This device's id and advertised name
    async fn login(
        &self,
        email: &str,
        password: &str,
        device: &Device,
    ) -> Result<LoginResponse, AccountError>;

    /// Fetches the full model state
    ///
    /// # Arguments
    /// * `full` - Request the complete snapshot rather than a delta
    async fn synchronize(&self, full: bool) -> Result<SynchronizeSnapshot, AccountError>;

    /// Registers a new peer transaction
    ///
    /// # Arguments
    /// * `recipient` - Email address or user id of the recipient; an
    ///   unregistered address yields a ghost recipient
    /// * `files` - File names offered
    /// * `total_size` - Sum of file sizes in bytes
    /// * `message` - Free-form note shown to the recipient
    ///
    /// # Returns
    /// The seeded record, including the server-assigned id and the ghost
    /// flag.
    async fn create_transaction(
        &self,
        recipient: &str,
        files: &[String],
        total_size: u64,
        message: &str,
    ) -> Result<TransactionRecord, AccountError>;

    /// Registers a new link transaction
    ///
    /// # Returns
    /// The seeded record, including the share URL.
    async fn create_link(
        &self,
        files: &[String],
        total_size: u64,
        message: &str,
    ) -> Result<TransactionRecord, AccountError>;

    /// Pushes a status change for a transaction this device runs
    async fn update_transaction(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<(), AccountError>;

    /// Looks up one account
    async fn user(&self, id: UserId) -> Result<User, AccountError>;

    /// Downloads one account's avatar image
    async fn icon(&self, id: UserId) -> Result<Vec<u8>, AccountError>;

    /// Consumes an invitation code
    ///
    /// Fails with [`AccountError::CodeAlreadyUsed`] when some account beat
    /// us to it.
    async fn use_ghost_code(&self, code: &str) -> Result<(), AccountError>;

    /// Re-fetches the push endpoint after a lost connection
    async fn notification_endpoint(&self) -> Result<Endpoint, AccountError>;

    /// Ends the RPC session server-side
    async fn logout(&self) -> Result<(), AccountError>;
}
