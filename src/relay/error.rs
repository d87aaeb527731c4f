//! Pipeline error definitions.

use thiserror::Error;

use crate::bitcoin::{Digest, SourceError};
use crate::blockchain::BlockchainError;

/// Errors raised by the relay pipeline.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Source-chain RPC failure.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Ledger RPC or transaction failure.
    #[error(transparent)]
    Ledger(#[from] BlockchainError),

    /// The registry's best digest is unknown to the source node.
    #[error("Relay's latest digest is not known to the source node. Got {0}. Hint: is your node on the same network as the relay?")]
    UnknownBestDigest(Digest),

    /// A header the pipeline depends on is missing from the source node.
    #[error("source node does not know header {0}")]
    MissingHeader(Digest),

    /// No header at a height that must exist (epoch bounds).
    #[error("source node has no header at height {0}")]
    MissingHeight(u64),

    /// The puller/batcher queue was closed.
    #[error("header queue closed")]
    QueueClosed,
}

/// Result type for pipeline operations.
pub type RelayResult<T> = Result<T, RelayError>;
