//! Pipeline context and task wiring.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::bitcoin::{Header, SourceChain};
use crate::blockchain::{ConsensusClient, TxDispatcher};
use crate::config::PipelineConfig;
use crate::lifecycle::Shutdown;
use crate::relay::batcher::HeaderBatcher;
use crate::relay::puller::HeaderPuller;

/// Everything the pipeline components share, built once at startup.
#[derive(Clone)]
pub struct RelayContext {
    pub source: Arc<dyn SourceChain>,
    pub registry: ConsensusClient,
    pub dispatcher: TxDispatcher,
    pub pipeline: PipelineConfig,
}

/// Start the puller and batcher on a fresh queue, both tracked by `shutdown`.
pub fn spawn_pipeline(ctx: &RelayContext, start: &Header, shutdown: &Shutdown) {
    let (tx, rx) = mpsc::channel(ctx.pipeline.queue_capacity);

    let puller = HeaderPuller::new(ctx.source.clone(), start, tx, &ctx.pipeline);
    let batcher = HeaderBatcher::new(ctx.clone(), rx);

    tracing::info!(
        start_height = start.height,
        queue_capacity = ctx.pipeline.queue_capacity,
        batch_size = ctx.pipeline.batch_size,
        "Starting header pipeline"
    );

    shutdown.spawn("header_puller", puller.run());
    shutdown.spawn("header_batcher", batcher.run());
}
