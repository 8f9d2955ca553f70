//! Session-level error type

use thiserror::Error;

use lnxsend_core::domain::ids::TransactionId;
use lnxsend_core::domain::status::{Role, TransactionStatus};
use lnxsend_core::ports::{AccountError, ChannelError, IdentityError, TransferError};

/// Failures surfaced by session operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Operation requires an established session
    #[error("not logged in")]
    NotLoggedIn,

    /// A logout aborted the login in flight
    #[error("login canceled")]
    LoginCanceled,

    /// The retry loop ran out of time
    #[error("login deadline exceeded")]
    LoginDeadlineExceeded,

    #[error("unknown transaction {0}")]
    UnknownTransaction(TransactionId),

    /// The operation's status precondition does not hold
    #[error("cannot {operation} a transaction in status {status}")]
    InvalidOperation {
        operation: &'static str,
        status: TransactionStatus,
    },

    /// The operation belongs to the other side of the transaction
    #[error("{operation} is reserved to the {expected} side")]
    WrongSide {
        operation: &'static str,
        expected: Role,
    },

    /// A file in the offer cannot be sized up
    #[error("cannot offer {path}: {reason}")]
    UnreadableFile { path: String, reason: String },

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl SessionError {
    /// Returns true if retrying the login with the same input cannot succeed
    ///
    /// Identity decryption failure counts: the blob only fails to open when
    /// the password is wrong or the material is corrupt.
    pub fn is_permanent_login_failure(&self) -> bool {
        match self {
            SessionError::Account(error) => error.is_permanent_login_failure(),
            SessionError::Identity(IdentityError::Decrypt(_)) => true,
            _ => false,
        }
    }
}
