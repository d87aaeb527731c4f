//! Tip advancement: mark the newest submitted header as the registry's best.

use alloy::primitives::U256;

use crate::bitcoin::{Digest, Header};
use crate::blockchain::abi::IRelay;
use crate::observability::metrics;
use crate::relay::error::{RelayError, RelayResult};
use crate::relay::pipeline::RelayContext;

/// What a successful advancement sent to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipAdvance {
    pub ancestor: Digest,
    pub current_best: Header,
    pub new_best: Header,
    pub limit: u64,
}

/// Run the advancement protocol for `new_best`.
///
/// Loops until a preflight succeeds and the transaction is dispatched, or
/// the registry already holds `new_best` (or something higher), in which
/// case `Ok(None)` is returned. Retries dry-run against the next nonce;
/// a nonce is only taken once the transaction is actually dispatched.
pub async fn advance_best_tip(ctx: &RelayContext, new_best: &Header) -> RelayResult<Option<TipAdvance>> {
    loop {
        let current_digest = ctx.registry.best_known_digest().await?;
        let current_best = ctx
            .source
            .header_by_hash(&current_digest)
            .await?
            .ok_or(RelayError::MissingHeader(current_digest))?;

        if current_best.hash == new_best.hash || current_best.height > new_best.height {
            tracing::info!(
                registry_best = %current_best,
                candidate = %new_best,
                "Registry best is already at or past candidate, not marking"
            );
            return Ok(None);
        }

        let limit = new_best.height - current_best.height + 1;

        let mut ancestor = current_best.clone();
        while !ctx.registry.is_ancestor(&ancestor.hash, &new_best.hash).await? {
            tracing::debug!(candidate = %ancestor, "Not a common ancestor, stepping back");
            let prev = ancestor.prevhash;
            ancestor = ctx
                .source
                .header_by_hash(&prev)
                .await?
                .ok_or(RelayError::MissingHeader(prev))?;
        }

        tracing::info!(
            ancestor = %ancestor,
            current_best = %current_best,
            new_best = %new_best,
            limit,
            "Marking new heaviest"
        );

        let call = IRelay::markNewHeaviestCall {
            ancestor: ancestor.hash.as_registry_word(),
            currentBest: current_best.raw.to_vec().into(),
            newBest: new_best.raw.to_vec().into(),
            limit: U256::from(limit),
        };
        let dry_run = ctx.dispatcher.build_call_with_nonce(&call, ctx.dispatcher.next_nonce());

        match ctx.dispatcher.preflight(&dry_run).await {
            Ok(true) => {
                let tx = ctx.dispatcher.build_call(&call);
                ctx.dispatcher.dispatch("markNewHeaviest", tx, false);
                metrics::record_best_height(new_best.height);
                return Ok(Some(TipAdvance {
                    ancestor: ancestor.hash,
                    current_best,
                    new_best: new_best.clone(),
                    limit,
                }));
            }
            Ok(false) => {
                tracing::info!("markNewHeaviest would fail, retrying");
            }
            Err(e) => {
                tracing::warn!(error = %e, "markNewHeaviest preflight failed, retrying");
            }
        }

        metrics::record_preflight_retry();
        tokio::time::sleep(ctx.pipeline.advance_backoff()).await;
    }
}
