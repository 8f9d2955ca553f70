//! Transfer engine port (driven/secondary port)
//!
//! The transfer engine is the opaque collaborator that actually moves
//! bytes: peer connectivity negotiation, relay fallback and cloud
//! buffering all live behind it. The session only starts it, pauses it,
//! asks for progress, and maps its phase reports onto transaction
//! statuses.

use thiserror::Error;

use crate::domain::ids::TransactionId;
use crate::domain::transaction::TransactionRecord;

/// Coarse phases a running transfer moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    /// Negotiating endpoints with the peer
    Connecting,
    /// Bytes are moving peer-to-peer
    Transferring,
    /// Uploaded to intermediate cloud storage instead
    CloudBuffered,
}

/// How a transfer ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Finished,
    Failed { reason: String },
}

/// Failures surfaced by the transfer engine
///
/// A `Resource` failure (disk full, missing directory) is fatal to the one
/// affected transaction only; the session marks it failed locally and
/// never propagates further.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("resource error: {0}")]
    Resource(String),

    #[error("transfer engine error: {0}")]
    Internal(String),
}

/// Callback the engine reports phase changes through
///
/// Invoked from the engine's own task; implementations must not block.
pub type PhaseSink = dyn Fn(TransferPhase) + Send + Sync;

/// Port trait for the byte-moving collaborator
#[async_trait::async_trait]
pub trait ITransferEngine: Send + Sync {
    /// Runs the transfer for one transaction to completion
    ///
    /// # Arguments
    /// * `record` - The transaction as last merged from the server
    /// * `phases` - Invoked on every phase change, in order
    async fn run(
        &self,
        record: &TransactionRecord,
        phases: &PhaseSink,
    ) -> Result<TransferOutcome, TransferError>;

    /// Suspends or resumes a running transfer without renegotiating
    /// endpoints
    async fn pause(&self, id: TransactionId, enabled: bool) -> Result<(), TransferError>;

    /// Abandons a running transfer; idempotent
    async fn abort(&self, id: TransactionId);

    /// Fraction completed, nominally in [0, 1]
    ///
    /// Engines may report slightly out-of-range values under rounding;
    /// callers clamp.
    async fn progress(&self, id: TransactionId) -> Result<f64, TransferError>;
}
