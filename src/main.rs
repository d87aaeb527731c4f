//! Relay maintainer
//!
//! Watches a source proof-of-work chain and keeps an on-chain header
//! registry in sync with it.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────┐
//!                  │                 RELAY MAINTAINER                  │
//!                  │                                                   │
//!   Source node    │  ┌──────────┐   bounded    ┌──────────────┐      │
//!   ───────────────┼─▶│  puller  │────queue────▶│   batcher    │      │
//!   (headers)      │  └──────────┘              └──────┬───────┘      │
//!                  │                                    │              │
//!                  │                      ┌─────────────┴──────────┐  │
//!                  │                      ▼                        ▼  │
//!                  │              ┌──────────────┐        ┌──────────┐│
//!                  │              │ epoch split  │        │ advance  ││
//!                  │              └──────┬───────┘        └────┬─────┘│
//!                  │                     ▼                     ▼      │
//!   Ledger node    │              ┌──────────────────────────────────┐│
//!   ◀──────────────┼──────────────│ dispatcher (nonce, sign, receipt)││
//!   (transactions) │              └──────────────────────────────────┘│
//!                  │                                                   │
//!                  │  config · observability · lifecycle (supervisor)  │
//!                  └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use relay_maintainer::config::{load_config, ObservabilityConfig};
use relay_maintainer::lifecycle::{self, LifecycleError};
use relay_maintainer::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "relay-maintainer", version, about = "Keep an on-chain header registry in sync")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "relay.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            let _guard = init_logging(&ObservabilityConfig::default());
            tracing::error!(path = %cli.config.display(), error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let _guard = init_logging(&config.observability);

    tracing::info!("relay-maintainer v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        network = %config.blockchain.network,
        chain_id = config.blockchain.resolved_chain_id(),
        contract = %config.blockchain.contract_address,
        source = %config.source.url,
        log_file = ?config.observability.log_file,
        "Configuration loaded"
    );

    exit_status(lifecycle::run(config).await)
}

/// Fatal lifecycle errors exit non-zero; an orderly shutdown exits zero.
fn exit_status(result: Result<(), LifecycleError>) -> ExitCode {
    match result {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "---- Fatal ----");
            ExitCode::FAILURE
        }
    }
}
