//! Ledger RPC client with timeout and failover.
//!
//! # Responsibilities
//! - Connect to the JSON-RPC endpoint (primary + failovers)
//! - Execute registry reads, nonce lookups, broadcasts, receipt lookups
//! - Handle timeouts and network errors by trying the next provider

use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::{TransportError, TransportResult};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::ledger::Ledger;
use crate::blockchain::types::{BlockchainConfig, BlockchainError, BlockchainResult, ChainId};

type SharedProvider = Arc<dyn Provider + Send + Sync>;

/// Ledger RPC client wrapper with failover support.
#[derive(Clone)]
pub struct BlockchainClient {
    /// List of providers (primary + failovers).
    providers: Vec<SharedProvider>,
    /// Configuration.
    config: BlockchainConfig,
    /// Request timeout duration.
    timeout_duration: Duration,
}

impl BlockchainClient {
    /// Create a new ledger client.
    ///
    /// Providers are built without fillers: nonce, gas and chain ID are
    /// always set explicitly by the dispatcher.
    pub async fn new(config: BlockchainConfig) -> BlockchainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(Arc::new(
            ProviderBuilder::new()
                .disable_recommended_fillers()
                .connect_http(primary_url),
        ) as SharedProvider);

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(Arc::new(
                    ProviderBuilder::new()
                        .disable_recommended_fillers()
                        .connect_http(url),
                ) as SharedProvider);
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        let client = Self {
            providers,
            config: config.clone(),
            timeout_duration,
        };

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %config.rpc_url,
                    chain_id = config.resolved_chain_id(),
                    "Ledger client initialized"
                );
            }
            Err(e) => {
                // Surfaces again on the first real call; startup reads the nonce next.
                tracing::warn!(
                    error = %e,
                    "Ledger client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let chain_id = self.get_chain_id().await?;
        let expected = self.config.resolved_chain_id();
        if chain_id.0 != expected {
            return Err(BlockchainError::ChainMismatch {
                expected,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    /// Get the chain ID from the RPC.
    pub async fn get_chain_id(&self) -> BlockchainResult<ChainId> {
        self.with_failover("get chain id", |p| async move { p.get_chain_id().await })
            .await
            .map(ChainId)
    }

    /// Run `op` against each provider in turn until one answers in time.
    async fn with_failover<T, F, Fut>(&self, what: &str, op: F) -> BlockchainResult<T>
    where
        F: Fn(SharedProvider) -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        let mut last_error = None;
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, op(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, error = %e, "RPC error, trying next provider");
                    last_error = Some(e.to_string());
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, "RPC timeout, trying next provider");
                }
            }
        }
        match last_error {
            Some(e) => Err(BlockchainError::Rpc(format!("All providers failed to {}: {}", what, e))),
            None => Err(BlockchainError::Timeout(self.config.rpc_timeout_secs)),
        }
    }
}

#[async_trait]
impl Ledger for BlockchainClient {
    async fn call(&self, tx: TransactionRequest) -> BlockchainResult<Bytes> {
        self.with_failover("execute call", |p| {
            let tx = tx.clone();
            async move { p.call(tx).await }
        })
        .await
    }

    async fn transaction_count(&self, address: Address) -> BlockchainResult<u64> {
        self.with_failover("get transaction count", |p| async move {
            p.get_transaction_count(address).await
        })
        .await
    }

    async fn send_raw_transaction(&self, encoded: Bytes) -> BlockchainResult<TxHash> {
        self.with_failover("broadcast", |p| {
            let encoded = encoded.clone();
            async move {
                let pending = p.send_raw_transaction(&encoded).await?;
                Ok::<_, TransportError>(*pending.tx_hash())
            }
        })
        .await
    }

    async fn unlock_account(&self, address: Address, unlock_code: &str) -> BlockchainResult<()> {
        let params = serde_json::value::to_raw_value(&(address, unlock_code))
            .map_err(|e| BlockchainError::Rpc(e.to_string()))?;
        let unlocked = self
            .with_failover("unlock account", |p| {
                let params = params.clone();
                async move {
                    p.raw_request_dyn("personal_unlockAccount".into(), &params)
                        .await
                }
            })
            .await?;
        tracing::debug!(address = %address, response = %unlocked.get(), "unlock account");
        Ok(())
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> BlockchainResult<TxHash> {
        self.with_failover("send transaction", |p| {
            let tx = tx.clone();
            async move {
                let pending = p.send_transaction(tx).await?;
                Ok::<_, TransportError>(*pending.tx_hash())
            }
        })
        .await
    }

    async fn receipt_status(&self, tx_hash: TxHash) -> BlockchainResult<Option<bool>> {
        let receipt = self
            .with_failover("get receipt", |p| async move {
                p.get_transaction_receipt(tx_hash).await
            })
            .await?;
        Ok(receipt.map(|r| r.status()))
    }

    async fn close(&self) -> BlockchainResult<()> {
        tracing::info!(providers = self.providers.len(), "closing ledger connections");
        Ok(())
    }
}

impl std::fmt::Debug for BlockchainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.resolved_chain_id())
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}
