//! Domain entities and business logic
//!
//! This module contains the core domain types for LNXSend:
//! - Newtypes for type-safe identifiers
//! - The transaction status state machine and its final sets
//! - Transaction records and durable snapshots
//! - User, device and ghost-code types
//! - The server-pushed configuration aggregate
//! - Domain-specific error types

pub mod configuration;
pub mod device;
pub mod errors;
pub mod ghost_code;
pub mod ids;
pub mod status;
pub mod transaction;
pub mod user;

// Re-export commonly used types
pub use configuration::{Configuration, MultipartUpload, S3Settings};
pub use device::Device;
pub use errors::{DomainError, StatusViolation};
pub use ghost_code::GhostCode;
pub use ids::{DeviceId, SessionId, TransactionId, UserId};
pub use status::{Role, TransactionStatus};
pub use transaction::{TransactionKind, TransactionRecord, TransactionSnapshot};
pub use user::{ExternalAccount, User};
