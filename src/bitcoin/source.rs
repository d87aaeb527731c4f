//! The source-chain collaborator seen by the relay pipeline.

use async_trait::async_trait;

use crate::bitcoin::types::{Digest, Header, SourceResult, SourceTransaction};

/// Read access to the proof-of-work network.
///
/// `Ok(None)` always means "not known (yet)", never a failure.
#[async_trait]
pub trait SourceChain: Send + Sync {
    /// Look up a header by its digest (internal order).
    async fn header_by_hash(&self, digest: &Digest) -> SourceResult<Option<Header>>;

    /// The header currently at `height` on the node's best chain.
    async fn header_by_height(&self, height: u64) -> SourceResult<Option<Header>>;

    /// Digests of every chain tip the node knows about.
    async fn chain_tips(&self) -> SourceResult<Vec<Digest>>;

    /// Look up a transaction by id (internal order).
    async fn transaction(&self, txid: &Digest) -> SourceResult<Option<SourceTransaction>>;

    /// Release transport resources. Called once during teardown.
    async fn close(&self) -> SourceResult<()> {
        Ok(())
    }
}
