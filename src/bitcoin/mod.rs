//! Source-chain (proof-of-work network) subsystem.
//!
//! # Data Flow
//! ```text
//! bcoin node (JSON-RPC + REST)
//!     → rpc.rs (BcoinClient, transport + response decoding)
//!     → types.rs (Header, Digest; byte-order conversion happens here only)
//!     → source.rs (SourceChain trait consumed by the relay pipeline)
//! ```
//!
//! # Byte Order
//! Digests are held in the registry's native (internal) order. The node
//! speaks display order. `Digest::from_rpc_hex` / `Digest::to_rpc_hex` are
//! the only conversions between the two.

pub mod rpc;
pub mod source;
pub mod types;

pub use rpc::BcoinClient;
pub use source::SourceChain;
pub use types::{Digest, Header, SourceError, SourceResult, SourceTransaction, RETARGET_INTERVAL};
