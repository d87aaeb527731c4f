//! Operator credentials and local transaction signing.
//!
//! # Security
//! - Private keys and unlock codes are loaded ONLY from environment variables
//! - Neither is ever logged or serialized

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;

use crate::blockchain::types::{BlockchainConfig, BlockchainError, BlockchainResult};

/// Local signing key for the operator account.
#[derive(Clone)]
pub struct Wallet {
    /// The underlying signer (private key).
    signer: PrivateKeySigner,
    /// Network wallet wrapping the signer, used to build envelopes.
    wallet: EthereumWallet,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    /// * `chain_id` - Chain ID for transaction signing
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> BlockchainResult<Self> {
        let key_hex = private_key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key format: {}", e)))?;

        tracing::info!(
            address = %signer.address(),
            chain_id = chain_id,
            "Wallet initialized"
        );

        Ok(Self {
            wallet: EthereumWallet::from(signer.clone()),
            signer,
            chain_id,
        })
    }

    /// Get the wallet's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign a fully specified transaction and return its EIP-2718 encoding.
    pub async fn sign_transaction(&self, tx: TransactionRequest) -> BlockchainResult<Bytes> {
        let envelope = tx
            .build(&self.wallet)
            .await
            .map_err(|e| BlockchainError::Wallet(format!("Signing failed: {}", e)))?;
        Ok(envelope.encoded_2718().into())
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

/// How transactions get signed.
#[derive(Clone)]
pub enum Credentials {
    /// Sign locally and broadcast the raw transaction.
    Local(Wallet),
    /// Unlock a node-held account and let the node sign and send.
    Remote { address: Address, unlock_code: String },
}

impl Credentials {
    /// Pick credentials from configuration. A key wins over an unlock code.
    pub fn from_config(config: &BlockchainConfig) -> BlockchainResult<Self> {
        if let Some(key) = &config.operator_key {
            return Ok(Self::Local(Wallet::from_private_key(key, config.resolved_chain_id())?));
        }

        match (&config.unlock_code, &config.operator_address) {
            (Some(code), Some(addr)) => {
                let address = addr
                    .parse()
                    .map_err(|e| BlockchainError::Wallet(format!("Invalid operator address: {}", e)))?;
                tracing::info!(address = %address, "Using node-held operator account");
                Ok(Self::Remote {
                    address,
                    unlock_code: code.clone(),
                })
            }
            _ => Err(BlockchainError::MissingCredentials),
        }
    }

    /// The operator account address.
    pub fn address(&self) -> Address {
        match self {
            Self::Local(wallet) => wallet.address(),
            Self::Remote { address, .. } => *address,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(wallet) => f.debug_tuple("Local").field(wallet).finish(),
            Self::Remote { address, .. } => f
                .debug_struct("Remote")
                .field("address", address)
                .finish_non_exhaustive(),
        }
    }
}
