//! Header forwarding pipeline.
//!
//! # Data Flow
//! ```text
//! registry best digest
//!     → bootstrap.rs (walk back until node and registry agree)
//!     → starting header
//!         → puller.rs (source chain, height by height) ─┐
//!                                                        │ bounded FIFO
//!         → batcher.rs (batch, classify by epoch) ◀──────┘
//!             → epoch.rs (ordinary / retarget / split)
//!             → TxDispatcher (addHeaders, addHeadersWithRetarget)
//!             → advance.rs (ancestor search, preflight, markNewHeaviest)
//! ```
//!
//! # Known Limitation
//! The puller never walks backward. A reorg behind its position is logged
//! and left to the tip-advancement protocol.

pub mod advance;
pub mod batcher;
pub mod bootstrap;
pub mod epoch;
pub mod error;
pub mod pipeline;
pub mod puller;

pub use advance::{advance_best_tip, TipAdvance};
pub use batcher::{collect_batch, HeaderBatcher};
pub use bootstrap::{bootstrap, resolve_start};
pub use epoch::{classify, BatchPlan};
pub use error::{RelayError, RelayResult};
pub use pipeline::{spawn_pipeline, RelayContext};
pub use puller::HeaderPuller;
