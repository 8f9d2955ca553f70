//! Identity store port (driven/secondary port)
//!
//! Cryptographic identity and passport issuance are out of scope; the
//! session only needs to unlock the identity blob delivered at login and
//! persist it (with the device passport) for the next start.

use thiserror::Error;

use crate::domain::ids::UserId;

/// Failures surfaced by the identity store
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Wrong password or corrupt blob
    #[error("credential decryption failed: {0}")]
    Decrypt(String),

    #[error("identity storage error: {0}")]
    Storage(String),
}

/// Port trait for credential material handling
#[async_trait::async_trait]
pub trait IIdentityStore: Send + Sync {
    /// Decrypts and caches the identity delivered at login
    async fn unlock(
        &self,
        user: UserId,
        encrypted_identity: &str,
        password: &str,
    ) -> Result<(), IdentityError>;

    /// Persists identity and passport for the next start
    async fn persist(
        &self,
        user: UserId,
        identity: &str,
        passport: &str,
    ) -> Result<(), IdentityError>;

    /// Drops any cached identity material; idempotent
    async fn clear(&self);
}
