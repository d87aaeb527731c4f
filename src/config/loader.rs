//! Configuration loading from disk and environment.

use std::path::Path;
use std::fs;
use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable for the operator's hex private key.
pub const OPERATOR_KEY_ENV_VAR: &str = "RELAY_OPERATOR_KEY";
/// Environment variable for the node-held account unlock code.
pub const UNLOCK_CODE_ENV_VAR: &str = "RELAY_GETH_UNLOCK";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load, override from the process environment, and validate.
///
/// A missing file yields the defaults, so a fully env-driven deployment
/// needs no file at all.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&content).map_err(ConfigError::Parse)?
    } else {
        tracing::info!(path = %path.display(), "No config file found, using defaults");
        RelayConfig::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `RELAY_*` overrides using the given lookup.
pub fn apply_env_overrides<F>(config: &mut RelayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = non_empty("RELAY_BCOIN_URL") {
        config.source.url = v;
    }
    if let Some(v) = non_empty("RELAY_BCOIN_API_KEY") {
        config.source.api_key = v;
    }
    if let Some(v) = non_empty("RELAY_ETHER_URL") {
        config.blockchain.rpc_url = v;
    }
    if let Some(v) = non_empty("RELAY_NETWORK") {
        config.blockchain.network = v;
    }
    if let Some(v) = non_empty("RELAY_CHAIN_ID") {
        match v.parse() {
            Ok(id) => config.blockchain.chain_id = id,
            Err(_) => tracing::warn!(value = %v, "Ignoring non-numeric RELAY_CHAIN_ID"),
        }
    }
    if let Some(v) = non_empty("RELAY_CONTRACT") {
        config.blockchain.contract_address = v;
    }
    if let Some(v) = non_empty("RELAY_OPERATOR_ADDRESS") {
        config.blockchain.operator_address = Some(v);
    }
    if let Some(v) = non_empty("RELAY_LOG_FILE") {
        config.observability.log_file = Some(v.into());
    }
    config.blockchain.operator_key = non_empty(OPERATOR_KEY_ENV_VAR);
    config.blockchain.unlock_code = non_empty(UNLOCK_CODE_ENV_VAR);
}
