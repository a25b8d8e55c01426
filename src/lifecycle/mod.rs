//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     closing flag set → dispatcher rejects new upgrades with 503
//!     broadcast sent → HTTP server stops accepting, sessions close (1001)
//!     → session registry drains with a deadline
//! ```
//!
//! # Design Decisions
//! - The closing flag is set before the broadcast, so any request that
//!   observes the broadcast also observes the flag
//! - Shutdown has timeout: forced exit after deadline

pub mod shutdown;
pub mod signals;

pub use shutdown::{ContainerLifecycle, Shutdown};
