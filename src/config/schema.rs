//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the config file.
//! Defaults reproduce the relay's production timings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the relay maintainer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Source-chain node connection.
    pub source: SourceConfig,

    /// Destination ledger and registry contract.
    pub blockchain: BlockchainConfig,

    /// Header pipeline timings and sizes.
    pub pipeline: PipelineConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Shutdown behavior.
    pub shutdown: ShutdownConfig,
}

/// Source-chain (bcoin) node configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Node HTTP endpoint.
    pub url: String,

    /// Node API key, sent as the basic-auth password.
    pub api_key: String,

    /// Per-request timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8332".to_string(),
            api_key: String::new(),
            rpc_timeout_secs: 30,
        }
    }
}

/// Destination ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Network name; well-known names pin the chain ID.
    pub network: String,

    /// Chain ID used when `network` is not a well-known name.
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Address of the relay registry contract.
    pub contract_address: String,

    /// Operator account. Derived from the key when a key is configured.
    pub operator_address: Option<String>,

    /// Gas limit for every registry transaction.
    pub gas_limit: u64,

    /// Gas price, in gwei or wei (see `normalize_gas_price`).
    pub gas_price: u128,

    /// Seconds between receipt polls.
    pub receipt_poll_secs: u64,

    /// Receipt polls before a transaction is declared lost.
    pub receipt_poll_attempts: u32,

    /// Hex private key. Environment only.
    #[serde(skip)]
    pub operator_key: Option<String>,

    /// Unlock code for a node-held account. Environment only.
    #[serde(skip)]
    pub unlock_code: Option<String>,
}

impl BlockchainConfig {
    /// Resolve the chain ID from the network name.
    pub fn resolved_chain_id(&self) -> u64 {
        match self.network.as_str() {
            "mainnet" => 1,
            "ropsten" => 3,
            "kovan" => 42,
            _ => self.chain_id,
        }
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_secs(self.receipt_poll_secs)
    }
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            failover_urls: Vec::new(),
            network: "ropsten".to_string(),
            chain_id: 1,
            rpc_timeout_secs: 10,
            contract_address: String::new(),
            operator_address: None,
            gas_limit: 500_000,
            gas_price: 2_000_000_000,
            receipt_poll_secs: 30,
            receipt_poll_attempts: 20,
            operator_key: None,
            unlock_code: None,
        }
    }
}

/// Header pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of the puller → batcher queue.
    pub queue_capacity: usize,

    /// Headers per batch, and headers between tip advancements.
    pub batch_size: usize,

    /// How long to wait for the next queued header once a batch has started.
    pub batch_idle_timeout_ms: u64,

    /// Sleep when the source chain has no header at the next height.
    pub tip_poll_secs: u64,

    /// Sleep between batch submission cycles.
    pub cycle_sleep_secs: u64,

    /// Sleep before restarting tip advancement after a failed preflight.
    pub advance_backoff_secs: u64,

    /// Depth bound passed to the registry's ancestor check.
    pub ancestor_search_limit: u64,

    /// Consecutive source RPC failures the puller tolerates.
    pub max_consecutive_rpc_errors: u32,
}

impl PipelineConfig {
    pub fn batch_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_idle_timeout_ms)
    }

    pub fn tip_poll_interval(&self) -> Duration {
        Duration::from_secs(self.tip_poll_secs)
    }

    pub fn cycle_sleep(&self) -> Duration {
        Duration::from_secs(self.cycle_sleep_secs)
    }

    pub fn advance_backoff(&self) -> Duration {
        Duration::from_secs(self.advance_backoff_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 50,
            batch_size: 5,
            batch_idle_timeout_ms: 1_000,
            tip_poll_secs: 60,
            cycle_sleep_secs: 45,
            advance_backoff_secs: 10,
            ancestor_search_limit: 240,
            max_consecutive_rpc_errors: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Optional debug-level log file, written alongside stdout.
    pub log_file: Option<PathBuf>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            log_file: None,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Deadline for background tasks to finish after cancellation.
    pub timeout_secs: u64,

    /// Pause before tearing down after an unexpected fault.
    pub fault_stall_secs: u64,

    /// Treat a failed or unconfirmed transaction as fatal for the process.
    pub halt_on_settlement_failure: bool,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            fault_stall_secs: 5,
            halt_on_settlement_failure: true,
        }
    }
}

impl ShutdownConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn fault_stall(&self) -> Duration {
        Duration::from_secs(self.fault_stall_secs)
    }
}
