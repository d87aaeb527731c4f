//! Startup reconciliation of the registry's tip with the source chain.

use crate::bitcoin::{Digest, Header, SourceChain};
use crate::relay::error::{RelayError, RelayResult};
use crate::relay::pipeline::RelayContext;

/// Walk back from `recorded` until the header by hash and the header by
/// height agree, i.e. until the candidate is on the node's best chain.
///
/// Terminates because the genesis header is never displaced.
pub async fn resolve_start(source: &dyn SourceChain, recorded: Digest) -> RelayResult<Header> {
    let mut candidate = source
        .header_by_hash(&recorded)
        .await?
        .ok_or(RelayError::UnknownBestDigest(recorded))?;

    loop {
        let at_height = source.header_by_height(candidate.height).await?;
        if at_height.as_ref() == Some(&candidate) {
            return Ok(candidate);
        }

        tracing::info!(
            displaced = %candidate,
            "Header is not on the best chain, crawling backwards"
        );
        let prev = candidate.prevhash;
        candidate = source
            .header_by_hash(&prev)
            .await?
            .ok_or(RelayError::MissingHeader(prev))?;
    }
}

/// Read the registry's best digest and resolve the pipeline's starting header.
pub async fn bootstrap(ctx: &RelayContext) -> RelayResult<Header> {
    let recorded = ctx.registry.best_known_digest().await?;
    tracing::info!(digest = %recorded, "Registry best known digest");

    match ctx.source.chain_tips().await {
        Ok(tips) => tracing::info!(tips = tips.len(), "Source node chain tips"),
        Err(e) => tracing::warn!(error = %e, "Could not read source chain tips"),
    }

    let latest = resolve_start(ctx.source.as_ref(), recorded).await?;
    tracing::info!("latest is {}", latest);

    if !ctx.registry.has_block(&latest.hash).await? {
        tracing::warn!(header = %latest, "Starting header is not known to the registry");
    }

    Ok(latest)
}
