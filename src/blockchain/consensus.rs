//! Read-only queries against the header registry.
//!
//! Every query is a point-in-time read of the registry's latest state.
//! Nothing is cached: other actors may move the registry between calls.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use std::sync::Arc;

use crate::bitcoin::Digest;
use crate::blockchain::abi::IRelay;
use crate::blockchain::ledger::Ledger;
use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// Client for the registry's view functions.
#[derive(Clone)]
pub struct ConsensusClient {
    ledger: Arc<dyn Ledger>,
    contract: Address,
    from: Address,
    ancestor_limit: u64,
}

impl ConsensusClient {
    pub fn new(ledger: Arc<dyn Ledger>, contract: Address, from: Address, ancestor_limit: u64) -> Self {
        Self {
            ledger,
            contract,
            from,
            ancestor_limit,
        }
    }

    async fn read<C: SolCall>(&self, call: &C) -> BlockchainResult<Bytes> {
        let tx = TransactionRequest::default()
            .with_from(self.from)
            .with_to(self.contract)
            .with_input(call.abi_encode());
        self.ledger.call(tx).await
    }

    /// Height the registry recorded for `digest`; 0 means unknown.
    pub async fn find_height(&self, digest: &Digest) -> BlockchainResult<u64> {
        let res = self
            .read(&IRelay::findHeightCall {
                digest: digest.as_registry_word(),
            })
            .await?;
        let height = decode_word(&res)?;
        tracing::debug!(digest = %digest, height = %height, "findHeight");
        Ok(height.try_into().unwrap_or(u64::MAX))
    }

    /// Whether the registry knows of `digest` at all.
    pub async fn has_block(&self, digest: &Digest) -> BlockchainResult<bool> {
        Ok(self.find_height(digest).await? != 0)
    }

    /// Whether `ancestor` precedes `descendant` within the configured depth.
    pub async fn is_ancestor(&self, ancestor: &Digest, descendant: &Digest) -> BlockchainResult<bool> {
        let res = self
            .read(&IRelay::isAncestorCall {
                ancestor: ancestor.as_registry_word(),
                descendant: descendant.as_registry_word(),
                limit: U256::from(self.ancestor_limit),
            })
            .await?;
        decode_bool(&res)
    }

    /// The registry's marked best digest.
    ///
    /// The registry may know a heavier header that has not been marked yet.
    pub async fn best_known_digest(&self) -> BlockchainResult<Digest> {
        let res = self.read(&IRelay::getBestKnownDigestCall {}).await?;
        Digest::from_slice(&res).ok_or(BlockchainError::MalformedDigest(res.len()))
    }
}

/// Decode a single ABI word as an unsigned integer.
pub(crate) fn decode_word(data: &[u8]) -> BlockchainResult<U256> {
    if data.len() < 32 {
        return Err(BlockchainError::Decode(format!(
            "expected a 32 byte word, got {} bytes",
            data.len()
        )));
    }
    Ok(U256::from_be_slice(&data[..32]))
}

/// Decode a single ABI word as a boolean (any non-zero word is true).
pub(crate) fn decode_bool(data: &[u8]) -> BlockchainResult<bool> {
    Ok(!decode_word(data)?.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_word() {
        let mut word = [0u8; 32];
        word[31] = 99;
        assert_eq!(decode_word(&word).unwrap(), U256::from(99));
        assert!(decode_bool(&word).unwrap());
        assert!(!decode_bool(&[0u8; 32]).unwrap());
        assert!(decode_word(&[]).is_err());
    }
}
