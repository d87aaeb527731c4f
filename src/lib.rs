//! Relay maintainer library.
//!
//! Forwards proof-of-work block headers from a source node into an on-chain
//! header registry and keeps the registry's best tip current.

pub mod bitcoin;
pub mod blockchain;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod relay;

pub use config::RelayConfig;
pub use lifecycle::Shutdown;
