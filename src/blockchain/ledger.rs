//! The destination-ledger collaborator.

use alloy::primitives::{Address, Bytes, TxHash};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

use crate::blockchain::types::BlockchainResult;

/// JSON-RPC surface of the destination ledger used by the relay.
///
/// Implemented by [`crate::blockchain::BlockchainClient`]; tests substitute
/// an in-memory registry.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Execute a call against the latest state without broadcasting.
    async fn call(&self, tx: TransactionRequest) -> BlockchainResult<Bytes>;

    /// The account's next nonce according to the ledger.
    async fn transaction_count(&self, address: Address) -> BlockchainResult<u64>;

    /// Broadcast a locally signed, EIP-2718 encoded transaction.
    async fn send_raw_transaction(&self, encoded: Bytes) -> BlockchainResult<TxHash>;

    /// Unlock a node-held account so the node can sign for it.
    async fn unlock_account(&self, address: Address, unlock_code: &str) -> BlockchainResult<()>;

    /// Ask the node to sign and send a transaction for an unlocked account.
    async fn send_transaction(&self, tx: TransactionRequest) -> BlockchainResult<TxHash>;

    /// `Some(success)` once a receipt exists, `None` while pending.
    async fn receipt_status(&self, tx_hash: TxHash) -> BlockchainResult<Option<bool>>;

    /// Release transport resources. Called once during teardown.
    async fn close(&self) -> BlockchainResult<()> {
        Ok(())
    }
}
