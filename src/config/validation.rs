//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Credential presence: a signing key, or an unlock code plus address
//! - Address and URL well-formedness, non-zero sizes and intervals
//! - Gas price sanity ceiling
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;
use std::fmt;

use crate::blockchain::transaction::normalize_gas_price;
use crate::config::schema::RelayConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let chain = &config.blockchain;

    if chain.contract_address.parse::<Address>().is_err() {
        errors.push(ValidationError::new(
            "blockchain.contract_address",
            format!("'{}' is not a valid address", chain.contract_address),
        ));
    }

    if let Some(addr) = &chain.operator_address {
        if addr.parse::<Address>().is_err() {
            errors.push(ValidationError::new(
                "blockchain.operator_address",
                format!("'{}' is not a valid address", addr),
            ));
        }
    }

    match (&chain.operator_key, &chain.unlock_code) {
        (Some(_), _) => {}
        (None, Some(_)) if chain.operator_address.is_some() => {}
        (None, Some(_)) => errors.push(ValidationError::new(
            "blockchain.operator_address",
            "an unlock code requires RELAY_OPERATOR_ADDRESS",
        )),
        (None, None) => errors.push(ValidationError::new(
            "blockchain.credentials",
            "set RELAY_OPERATOR_KEY or RELAY_GETH_UNLOCK; transactions cannot be signed",
        )),
    }

    if let Err(e) = normalize_gas_price(chain.gas_price) {
        errors.push(ValidationError::new("blockchain.gas_price", e.to_string()));
    }

    for (field, url) in [("source.url", &config.source.url), ("blockchain.rpc_url", &chain.rpc_url)] {
        if url.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new(field, format!("'{}' is not a valid URL", url)));
        }
    }

    let pipeline = &config.pipeline;
    if pipeline.batch_size == 0 {
        errors.push(ValidationError::new("pipeline.batch_size", "must be at least 1"));
    }
    if pipeline.queue_capacity == 0 {
        errors.push(ValidationError::new("pipeline.queue_capacity", "must be at least 1"));
    }
    if pipeline.batch_idle_timeout_ms == 0 {
        errors.push(ValidationError::new("pipeline.batch_idle_timeout_ms", "must be positive"));
    }
    for (field, value) in [
        ("pipeline.tip_poll_secs", pipeline.tip_poll_secs),
        ("pipeline.cycle_sleep_secs", pipeline.cycle_sleep_secs),
        ("pipeline.advance_backoff_secs", pipeline.advance_backoff_secs),
        ("blockchain.receipt_poll_secs", chain.receipt_poll_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be positive"));
        }
    }
    if pipeline.ancestor_search_limit == 0 {
        errors.push(ValidationError::new("pipeline.ancestor_search_limit", "must be positive"));
    }
    if chain.receipt_poll_attempts == 0 {
        errors.push(ValidationError::new("blockchain.receipt_poll_attempts", "must be at least 1"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
