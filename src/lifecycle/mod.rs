//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Source client → Ledger client → Credentials → Dispatcher
//!         → Registry best digest → Bootstrap → Spawn puller + batcher
//!
//! Supervision (startup.rs):
//!     Signal or fatal fault → (stall on fault) → Close clients → Drain tasks
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT/SIGHUP → Trigger graceful shutdown
//!
//! Shutdown (shutdown.rs):
//!     Task tracking, cancellation, fault reporting
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Teardown failures are fatal and skip the drain
//! - Shutdown has timeout: forced exit after deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{DrainTimeout, Fault, Shutdown};
pub use startup::{run, LifecycleError, Supervisor};
