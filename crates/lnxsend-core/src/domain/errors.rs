//! Domain error types
//!
//! This module defines error types specific to domain operations:
//! identifier parsing failures and disallowed status transitions.

use thiserror::Error;

use super::status::TransactionStatus;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid email address format
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

/// An update request along a disallowed status edge
///
/// Raised by precondition checks on local operations. Server-delivered
/// updates along a disallowed edge are logged and ignored instead; the
/// resync coordinator treats them as benign merge incompatibilities.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Status transition from {from} to {to} is not allowed")]
pub struct StatusViolation {
    /// The current status
    pub from: TransactionStatus,
    /// The attempted target status
    pub to: TransactionStatus,
}

impl StatusViolation {
    /// Creates a violation for the given edge
    pub fn new(from: TransactionStatus, to: TransactionStatus) -> Self {
        Self { from, to }
    }
}
