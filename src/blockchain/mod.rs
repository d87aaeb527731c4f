//! Destination ledger subsystem.
//!
//! # Data Flow
//! ```text
//! Environment (operator key or unlock code) + config (RPC URL, contract)
//!     → wallet.rs (credentials, local signing)
//!     → client.rs (RPC connection with timeouts and failover; implements Ledger)
//!     → consensus.rs (read-only registry queries)
//!     → transaction.rs (nonce sequence, gas policy, sign/broadcast, receipts)
//! ```
//!
//! # Security Constraints
//! - Private keys and unlock codes ONLY from environment variables
//! - Never log private keys or unlock codes
//! - All RPC calls have configurable timeouts

pub mod abi;
pub mod client;
pub mod consensus;
pub mod ledger;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::BlockchainClient;
pub use consensus::ConsensusClient;
pub use ledger::Ledger;
pub use transaction::{normalize_gas_price, NonceSequence, TxDispatcher};
pub use types::{BlockchainConfig, BlockchainError, BlockchainResult, ChainId};
pub use wallet::{Credentials, Wallet};
