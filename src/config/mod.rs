//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! relay.toml (optional)
//!     → loader.rs (parse & deserialize, then environment overrides)
//!     → validation.rs (semantic checks, all errors at once)
//!     → RelayConfig (validated, immutable)
//!     → handed to startup, which builds every component from it
//! ```
//!
//! # Design Decisions
//! - Secrets (operator key, unlock code) come only from the environment
//! - All fields have defaults so an empty file is a valid starting point
//! - No hot reload: the nonce sequence assumes a single, fixed operator

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::BlockchainConfig;
pub use schema::ObservabilityConfig;
pub use schema::PipelineConfig;
pub use schema::RelayConfig;
pub use schema::ShutdownConfig;
pub use schema::SourceConfig;
pub use loader::{load_config, ConfigError};
