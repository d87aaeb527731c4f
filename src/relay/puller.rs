//! Source-chain header puller.
//!
//! Walks the node's best chain one height at a time and feeds headers into
//! the bounded queue. A full queue blocks the puller until the batcher
//! catches up.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::bitcoin::{Header, SourceChain};
use crate::config::PipelineConfig;
use crate::observability::metrics;
use crate::relay::error::{RelayError, RelayResult};

/// Producer half of the pipeline.
pub struct HeaderPuller {
    source: Arc<dyn SourceChain>,
    queue: mpsc::Sender<Header>,
    next_height: u64,
    last_added: Header,
    tip_poll: Duration,
    max_consecutive_errors: u32,
}

impl HeaderPuller {
    /// Create a puller that starts just above `start`.
    pub fn new(
        source: Arc<dyn SourceChain>,
        start: &Header,
        queue: mpsc::Sender<Header>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            source,
            queue,
            next_height: start.height + 1,
            last_added: start.clone(),
            tip_poll: config.tip_poll_interval(),
            max_consecutive_errors: config.max_consecutive_rpc_errors,
        }
    }

    /// The height that will be requested next.
    pub fn next_height(&self) -> u64 {
        self.next_height
    }

    /// Pull forever. Returns only on a closed queue or persistent RPC failure.
    pub async fn run(mut self) -> RelayResult<()> {
        let mut consecutive_errors = 0u32;

        loop {
            let header = match self.source.header_by_height(self.next_height).await {
                Ok(Some(header)) => {
                    consecutive_errors = 0;
                    header
                }
                Ok(None) => {
                    consecutive_errors = 0;
                    tracing::debug!(height = self.next_height, "At source tip, sleeping");
                    tokio::time::sleep(self.tip_poll).await;
                    continue;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors > self.max_consecutive_errors {
                        tracing::error!(
                            height = self.next_height,
                            error = %e,
                            "Giving up after repeated source errors"
                        );
                        return Err(e.into());
                    }
                    tracing::warn!(
                        height = self.next_height,
                        attempt = consecutive_errors,
                        error = %e,
                        "Source lookup failed, retrying"
                    );
                    tokio::time::sleep(self.tip_poll).await;
                    continue;
                }
            };

            if header == self.last_added || header.height != self.next_height {
                tracing::debug!(header = %header, "Ignoring repeated header");
                tokio::time::sleep(self.tip_poll).await;
                continue;
            }

            if header.prevhash != self.last_added.hash {
                tracing::warn!(
                    header = %header,
                    previous = %self.last_added,
                    "Header does not extend the last enqueued header, source chain reorganized"
                );
            }

            tracing::info!("adding {}", header);
            self.queue
                .send(header.clone())
                .await
                .map_err(|_| RelayError::QueueClosed)?;
            metrics::record_header_enqueued(header.height);

            self.last_added = header;
            self.next_height += 1;
        }
    }
}
