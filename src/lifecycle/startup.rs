//! Startup orchestration and supervision.
//!
//! # Responsibilities
//! - Build the source and ledger clients from configuration
//! - Resolve credentials and seed the transaction dispatcher
//! - Reconcile the registry's tip with the source chain
//! - Spawn the pipeline and supervise it until a signal or fatal fault
//! - Tear down clients and drain tasks within the shutdown deadline

use alloy::primitives::Address;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::bitcoin::{BcoinClient, SourceChain, SourceError};
use crate::blockchain::{
    BlockchainClient, BlockchainError, ConsensusClient, Credentials, Ledger, TxDispatcher,
};
use crate::config::{RelayConfig, ShutdownConfig};
use crate::lifecycle::shutdown::{DrainTimeout, Fault, Shutdown};
use crate::lifecycle::signals::wait_for_signal;
use crate::observability::metrics;
use crate::relay::{bootstrap, spawn_pipeline, RelayContext, RelayError};

/// Anything that ends the process with a failure status.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid address '{0}'")]
    Address(String),

    #[error("metrics exporter: {0}")]
    Metrics(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Ledger(#[from] BlockchainError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("{0}")]
    Fault(Fault),

    #[error("teardown failed: {0}")]
    Teardown(String),

    #[error(transparent)]
    Drain(#[from] DrainTimeout),
}

/// Start everything and run until shutdown.
pub async fn run(config: RelayConfig) -> Result<(), LifecycleError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| LifecycleError::Address(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr).map_err(|e| LifecycleError::Metrics(e.to_string()))?;
        tracing::info!(address = %addr, "Metrics exporter listening");
    }

    let contract: Address = config
        .blockchain
        .contract_address
        .parse()
        .map_err(|_| LifecycleError::Address(config.blockchain.contract_address.clone()))?;

    let source: Arc<dyn SourceChain> = Arc::new(BcoinClient::new(&config.source)?);
    let ledger: Arc<dyn Ledger> = Arc::new(BlockchainClient::new(config.blockchain.clone()).await?);
    let credentials = Credentials::from_config(&config.blockchain)?;
    let operator = credentials.address();
    tracing::info!(operator = %operator, contract = %contract, "Credentials loaded");

    let (shutdown, faults) = Shutdown::new();
    let dispatcher = TxDispatcher::new(
        ledger.clone(),
        credentials,
        &config.blockchain,
        contract,
        shutdown.clone(),
    )
    .await?;
    let registry = ConsensusClient::new(
        ledger.clone(),
        contract,
        operator,
        config.pipeline.ancestor_search_limit,
    );

    let ctx = RelayContext {
        source: source.clone(),
        registry,
        dispatcher,
        pipeline: config.pipeline.clone(),
    };

    let start = bootstrap(&ctx).await?;
    spawn_pipeline(&ctx, &start, &shutdown);

    Supervisor::new(shutdown, faults, config.shutdown)
        .run_until(wait_for_signal(), source, ledger)
        .await
}

/// Waits for a signal or a fatal fault, then tears everything down.
pub struct Supervisor {
    shutdown: Shutdown,
    faults: mpsc::UnboundedReceiver<Fault>,
    config: ShutdownConfig,
}

impl Supervisor {
    pub fn new(shutdown: Shutdown, faults: mpsc::UnboundedReceiver<Fault>, config: ShutdownConfig) -> Self {
        Self {
            shutdown,
            faults,
            config,
        }
    }

    /// Supervise until `signal` resolves or a fatal fault arrives.
    ///
    /// Returns `Ok` for a signal-initiated shutdown and the fault otherwise.
    pub async fn run_until<S>(
        mut self,
        signal: S,
        source: Arc<dyn SourceChain>,
        ledger: Arc<dyn Ledger>,
    ) -> Result<(), LifecycleError>
    where
        S: Future<Output = &'static str>,
    {
        let fault = tokio::select! {
            name = signal => {
                tracing::info!(signal = name, "Received shutdown signal");
                None
            }
            fault = next_fatal_fault(&mut self.faults, self.config.halt_on_settlement_failure) => fault,
        };

        if let Some(fault) = &fault {
            tracing::error!(fault = %fault, "Fatal fault, shutting down");
            tokio::time::sleep(self.config.fault_stall()).await;
        }

        let closed = teardown(source.as_ref(), ledger.as_ref()).await;
        self.shutdown.trigger();
        closed?;
        self.shutdown.drain(self.config.timeout()).await?;

        match fault {
            Some(fault) => Err(LifecycleError::Fault(fault)),
            None => Ok(()),
        }
    }
}

/// Wait for a fault that must stop the process.
///
/// Settlement faults are logged and skipped unless `halt_on_settlement`.
/// `None` if every sender is gone.
async fn next_fatal_fault(faults: &mut mpsc::UnboundedReceiver<Fault>, halt_on_settlement: bool) -> Option<Fault> {
    loop {
        let fault = faults.recv().await?;
        match &fault {
            Fault::Settlement { .. } if !halt_on_settlement => {
                tracing::error!(fault = %fault, "Transaction failed, continuing");
            }
            _ => return Some(fault),
        }
    }
}

async fn teardown(source: &dyn SourceChain, ledger: &dyn Ledger) -> Result<(), LifecycleError> {
    tracing::info!("Closing source and ledger connections");
    let (source_res, ledger_res) = tokio::join!(source.close(), ledger.close());
    source_res.map_err(|e| LifecycleError::Teardown(e.to_string()))?;
    ledger_res.map_err(|e| LifecycleError::Teardown(e.to_string()))?;
    Ok(())
}
