//! Transaction sequencing, signing, broadcast, and receipt tracking.
//!
//! # Responsibilities
//! - Own the operator's nonce sequence (one value per transaction built)
//! - Normalize and bound the gas price
//! - Sign locally or via a node-held account, then broadcast
//! - Track receipts in detached, shutdown-aware tasks

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::consensus::decode_bool;
use crate::blockchain::ledger::Ledger;
use crate::blockchain::types::{BlockchainConfig, BlockchainError, BlockchainResult};
use crate::blockchain::wallet::Credentials;
use crate::lifecycle::shutdown::{Fault, Shutdown};
use crate::observability::metrics;

/// One gwei in wei.
pub const GWEI: u128 = 1_000_000_000;

/// Highest gas price accepted, in wei.
pub const MAX_GAS_PRICE: u128 = 1000 * GWEI;

/// Accept a gas price in gwei or wei and return wei.
///
/// Values below one gwei are read as gwei. Anything above the ceiling is
/// rejected, since it almost certainly comes from a unit mix-up.
pub fn normalize_gas_price(gas_price: u128) -> BlockchainResult<u128> {
    let wei = if gas_price < GWEI {
        gas_price.saturating_mul(GWEI)
    } else {
        gas_price
    };
    if wei > MAX_GAS_PRICE {
        tracing::error!(gas_price, "rejecting high gas price");
        return Err(BlockchainError::GasPriceTooHigh {
            gwei: wei / GWEI,
            max_gwei: MAX_GAS_PRICE / GWEI,
        });
    }
    Ok(wei)
}

/// Process-wide nonce counter. Values are handed out once and never reused.
#[derive(Debug)]
pub struct NonceSequence {
    next: AtomicU64,
}

impl NonceSequence {
    pub fn starting_at(nonce: u64) -> Self {
        Self {
            next: AtomicU64::new(nonce),
        }
    }

    /// Take the next nonce.
    pub fn allocate(&self) -> u64 {
        let nonce = self.next.fetch_add(1, Ordering::SeqCst);
        metrics::record_next_nonce(nonce + 1);
        nonce
    }

    /// The value the next `allocate` will return.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

/// Receipt polling budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptPolicy {
    pub interval: Duration,
    pub attempts: u32,
}

impl ReceiptPolicy {
    pub fn from_config(config: &BlockchainConfig) -> Self {
        Self {
            interval: config.receipt_poll_interval(),
            attempts: config.receipt_poll_attempts,
        }
    }
}

/// Turns registry calls into signed, broadcast transactions.
///
/// Cloning shares the nonce sequence; every clone dispatches for the same
/// operator account.
#[derive(Clone)]
pub struct TxDispatcher {
    ledger: Arc<dyn Ledger>,
    credentials: Arc<Credentials>,
    nonce: Arc<NonceSequence>,
    contract: Address,
    chain_id: u64,
    gas_limit: u64,
    gas_price: u128,
    receipts: ReceiptPolicy,
    shutdown: Shutdown,
}

impl TxDispatcher {
    /// Create a dispatcher, seeding the nonce sequence from the ledger.
    pub async fn new(
        ledger: Arc<dyn Ledger>,
        credentials: Credentials,
        config: &BlockchainConfig,
        contract: Address,
        shutdown: Shutdown,
    ) -> BlockchainResult<Self> {
        let gas_price = normalize_gas_price(config.gas_price)?;
        let address = credentials.address();
        let nonce = ledger.transaction_count(address).await?;
        tracing::info!(address = %address, nonce, "nonce is {}", nonce);
        metrics::record_next_nonce(nonce);

        Ok(Self {
            ledger,
            credentials: Arc::new(credentials),
            nonce: Arc::new(NonceSequence::starting_at(nonce)),
            contract,
            chain_id: config.resolved_chain_id(),
            gas_limit: config.gas_limit,
            gas_price,
            receipts: ReceiptPolicy::from_config(config),
            shutdown,
        })
    }

    /// The operator account.
    pub fn address(&self) -> Address {
        self.credentials.address()
    }

    /// Take a nonce for a transaction that will be built later.
    pub fn allocate_nonce(&self) -> u64 {
        self.nonce.allocate()
    }

    /// The value the next allocation will return.
    pub fn next_nonce(&self) -> u64 {
        self.nonce.peek()
    }

    /// Build an unsigned registry transaction, consuming one nonce.
    pub fn build_call<C: SolCall>(&self, call: &C) -> TransactionRequest {
        let nonce = self.nonce.allocate();
        self.build_call_with_nonce(call, nonce)
    }

    /// Build an unsigned registry transaction with a previously allocated nonce.
    pub fn build_call_with_nonce<C: SolCall>(&self, call: &C, nonce: u64) -> TransactionRequest {
        tracing::debug!(
            method = C::SIGNATURE,
            contract = %self.contract,
            nonce,
            "making tx call"
        );
        TransactionRequest::default()
            .with_from(self.address())
            .with_to(self.contract)
            .with_value(U256::ZERO)
            .with_input(Bytes::from(call.abi_encode()))
            .with_nonce(nonce)
            .with_gas_price(self.gas_price)
            .with_gas_limit(self.gas_limit)
            .with_chain_id(self.chain_id)
    }

    /// Dry-run a transaction; `true` if the registry call would return true.
    pub async fn preflight(&self, tx: &TransactionRequest) -> BlockchainResult<bool> {
        let res = self.ledger.call(tx.clone()).await?;
        decode_bool(&res)
    }

    /// Sign and broadcast in a tracked background task.
    ///
    /// Unless `ignore_result` is set, the same task then polls for the
    /// receipt and reports a settlement fault if it fails or never lands.
    pub fn dispatch(&self, method: &'static str, tx: TransactionRequest, ignore_result: bool) {
        let this = self.clone();
        self.shutdown.spawn("broadcast", async move {
            let tx_hash = this.sign_and_broadcast(tx).await?;
            tracing::info!(method, tx_hash = %tx_hash, "dispatched transaction {}", tx_hash);
            metrics::record_transaction_dispatched(method);

            if !ignore_result {
                if let Err(e) = this.track_receipt(tx_hash).await {
                    metrics::record_transaction_failure(match &e {
                        BlockchainError::Reverted(_) => "reverted",
                        _ => "no_receipt",
                    });
                    this.shutdown.report(Fault::Settlement {
                        tx_hash,
                        error: e.to_string(),
                    });
                }
            }
            Ok::<(), BlockchainError>(())
        });
    }

    /// Sign with whichever credentials are configured and broadcast.
    pub async fn sign_and_broadcast(&self, tx: TransactionRequest) -> BlockchainResult<TxHash> {
        match self.credentials.as_ref() {
            Credentials::Local(wallet) => {
                tracing::debug!("signing with local key");
                let encoded = wallet.sign_transaction(tx).await?;
                self.ledger.send_raw_transaction(encoded).await
            }
            Credentials::Remote { address, unlock_code } => {
                tracing::debug!("signing with ether node");
                self.ledger.unlock_account(*address, unlock_code).await?;
                self.ledger.send_transaction(tx).await
            }
        }
    }

    /// Poll for a receipt until it lands or the budget runs out.
    pub async fn track_receipt(&self, tx_hash: TxHash) -> BlockchainResult<()> {
        let ReceiptPolicy { interval, attempts } = self.receipts;

        for attempt in 1..=attempts {
            tokio::time::sleep(interval).await;
            match self.ledger.receipt_status(tx_hash).await {
                Ok(Some(true)) => {
                    tracing::info!(tx_hash = %tx_hash, "Receipt for {} status is 0x1", tx_hash);
                    return Ok(());
                }
                Ok(Some(false)) => {
                    tracing::error!(tx_hash = %tx_hash, "Receipt for {} status is 0x0", tx_hash);
                    return Err(BlockchainError::Reverted(tx_hash));
                }
                Ok(None) => {
                    tracing::debug!(tx_hash = %tx_hash, attempt, "Transaction pending");
                }
                Err(e) => {
                    tracing::warn!(tx_hash = %tx_hash, attempt, error = %e, "Receipt lookup failed");
                }
            }
        }

        Err(BlockchainError::ReceiptTimeout { tx_hash, attempts })
    }
}

impl std::fmt::Debug for TxDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxDispatcher")
            .field("address", &self.address())
            .field("contract", &self.contract)
            .field("next_nonce", &self.nonce.peek())
            .field("gas_price", &self.gas_price)
            .finish()
    }
}
