//! Chain-specific types and error definitions.

use alloy::primitives::TxHash;
use thiserror::Error;

// Re-export BlockchainConfig from config module to avoid duplication
pub use crate::config::schema::BlockchainConfig;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// No receipt appeared within the polling budget.
    #[error("No receipt after {attempts} polls: {tx_hash}")]
    ReceiptTimeout { tx_hash: TxHash, attempts: u32 },

    /// Transaction was mined but execution failed.
    #[error("Failed tx: {0}")]
    Reverted(TxHash),

    /// Invalid private key format or signing error.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Neither a signing key nor an unlock code is configured.
    #[error("Attempted to sign tx without access to key")]
    MissingCredentials,

    /// Gas price exceeded the sanity ceiling.
    #[error("very high gas price detected: {gwei} gwei (ceiling {max_gwei} gwei)")]
    GasPriceTooHigh { gwei: u128, max_gwei: u128 },

    /// The registry returned a digest that is not 32 bytes.
    #[error("Expected 32 byte digest from contract. Received {0} bytes instead. Hint: is this account authorized?")]
    MalformedDigest(usize),

    /// Call return data could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}

/// Result type for ledger operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;
