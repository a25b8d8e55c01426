//! Upgrade dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Request
//!     → InterceptCheck (Upgrade header?)          no → pass through
//!     → PathLookup (sealed EndpointRegistry)      no → pass through
//!     → NegotiationLoop (first accepting wins)    no → pass through
//!     → shutdown check                          closing → 503, empty body
//!     → RequestScope + IdentityBridge + HandshakeContext
//!     → negotiator.handshake(.., Completion)
//!     → Completion: shutdown re-check → SessionFactory::connected
//! ```
//!
//! # Design Decisions
//! - Declines are values, never errors; the host pipeline continues unchanged
//! - Identity and path parameters travel as explicit values; the ambient
//!   identity is re-established wherever the completion runs
//! - The dispatcher is only constructible from a sealed registry

pub mod dispatcher;
pub mod middleware;
pub mod scope;

pub use dispatcher::{Dispatch, DispatchOutcome, UpgradeDispatcher};
pub use middleware::upgrade_middleware;
pub use scope::RequestScope;
