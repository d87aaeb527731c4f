//! Header batcher and submitter.
//!
//! Drains the queue into batches of up to `batch_size` headers, submits each
//! batch in the shape its epoch position requires, and every `batch_size`
//! submitted headers runs the tip-advancement protocol.

use std::time::Duration;
use tokio::sync::mpsc;

use crate::bitcoin::Header;
use crate::blockchain::abi::IRelay;
use crate::observability::metrics;
use crate::relay::advance::advance_best_tip;
use crate::relay::epoch::{classify, concat_raw, previous_epoch_bounds, BatchPlan};
use crate::relay::error::{RelayError, RelayResult};
use crate::relay::pipeline::RelayContext;

/// Wait for up to `max` headers.
///
/// Blocks for the first header, then stops early once no header arrives for
/// `idle`. Returns `None` only when the queue is closed and empty.
pub async fn collect_batch(
    queue: &mut mpsc::Receiver<Header>,
    max: usize,
    idle: Duration,
) -> Option<Vec<Header>> {
    let first = queue.recv().await?;
    let mut batch = Vec::with_capacity(max);
    batch.push(first);

    while batch.len() < max {
        match tokio::time::timeout(idle, queue.recv()).await {
            Ok(Some(header)) => batch.push(header),
            Ok(None) | Err(_) => break,
        }
    }
    Some(batch)
}

/// Consumer half of the pipeline.
pub struct HeaderBatcher {
    ctx: RelayContext,
    queue: mpsc::Receiver<Header>,
    since_advance: usize,
}

impl HeaderBatcher {
    pub fn new(ctx: RelayContext, queue: mpsc::Receiver<Header>) -> Self {
        Self {
            ctx,
            queue,
            since_advance: 0,
        }
    }

    /// Batch and submit until the queue closes or a submission fails.
    pub async fn run(mut self) -> RelayResult<()> {
        let max = self.ctx.pipeline.batch_size;
        let idle = self.ctx.pipeline.batch_idle_timeout();

        loop {
            let batch = collect_batch(&mut self.queue, max, idle)
                .await
                .ok_or(RelayError::QueueClosed)?;
            self.process_batch(batch).await?;

            tracing::debug!("Sleeping before next batch");
            tokio::time::sleep(self.ctx.pipeline.cycle_sleep()).await;
        }
    }

    /// Submit one batch and advance the registry's tip if enough headers
    /// have gone out since the last advancement.
    pub async fn process_batch(&mut self, batch: Vec<Header>) -> RelayResult<()> {
        let Some(newest) = batch.last().cloned() else {
            return Ok(());
        };
        let count = batch.len();

        match classify(batch) {
            Some(BatchPlan::Ordinary(headers)) => self.submit_headers(&headers).await?,
            Some(BatchPlan::Retarget(headers)) => self.submit_retarget(&headers).await?,
            Some(BatchPlan::Split {
                pre_change,
                post_change,
            }) => {
                tracing::info!(
                    pre = pre_change.len(),
                    post = post_change.len(),
                    "Batch crosses a difficulty change, splitting"
                );
                if !pre_change.is_empty() {
                    self.submit_headers(&pre_change).await?;
                }
                if !post_change.is_empty() {
                    self.submit_retarget(&post_change).await?;
                }
            }
            None => return Ok(()),
        }

        self.since_advance += count;
        if self.since_advance >= self.ctx.pipeline.batch_size {
            advance_best_tip(&self.ctx, &newest).await?;
            self.since_advance = 0;
        }
        Ok(())
    }

    /// Submit headers that extend their parent within one epoch.
    async fn submit_headers(&self, headers: &[Header]) -> RelayResult<()> {
        let Some(first) = headers.first() else {
            return Ok(());
        };
        let anchor = self
            .ctx
            .source
            .header_by_hash(&first.prevhash)
            .await?
            .ok_or(RelayError::MissingHeader(first.prevhash))?;

        tracing::info!(
            first = first.height,
            count = headers.len(),
            "Sending {} new headers",
            headers.len()
        );
        let call = IRelay::addHeadersCall {
            anchor: anchor.raw.to_vec().into(),
            headers: concat_raw(headers),
        };
        let tx = self.ctx.dispatcher.build_call(&call);
        self.ctx.dispatcher.dispatch("addHeaders", tx, false);
        metrics::record_headers_submitted("ordinary", headers.len());
        Ok(())
    }

    /// Submit headers starting on an epoch boundary with the previous
    /// epoch's first and last headers.
    async fn submit_retarget(&self, headers: &[Header]) -> RelayResult<()> {
        let Some(first) = headers.first() else {
            return Ok(());
        };
        let (start_height, end_height) =
            previous_epoch_bounds(first.height).ok_or(RelayError::MissingHeight(first.height))?;

        let (old_start, old_end) = tokio::try_join!(
            self.ctx.source.header_by_height(start_height),
            self.ctx.source.header_by_height(end_height),
        )?;
        let old_start = old_start.ok_or(RelayError::MissingHeight(start_height))?;
        let old_end = old_end.ok_or(RelayError::MissingHeight(end_height))?;

        tracing::info!(
            first = first.height,
            count = headers.len(),
            old_start = %old_start,
            old_end = %old_end,
            "Sending {} new headers with difficulty change",
            headers.len()
        );
        let call = IRelay::addHeadersWithRetargetCall {
            oldPeriodStartHeader: old_start.raw.to_vec().into(),
            oldPeriodEndHeader: old_end.raw.to_vec().into(),
            headers: concat_raw(headers),
        };
        let tx = self.ctx.dispatcher.build_call(&call);
        self.ctx.dispatcher.dispatch("addHeadersWithRetarget", tx, false);
        metrics::record_headers_submitted("retarget", headers.len());
        Ok(())
    }
}
