//! WebSocket upgrade gateway library.
//!
//! Intercepts HTTP upgrade requests, matches them against sealed endpoint
//! path templates, negotiates a hybi handshake and hands the upgraded
//! connection to a session factory under the caller's security identity.
//! Requests without upgrade intent pass through to the plain HTTP router.

// Core subsystems
pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod http;
pub mod negotiation;
pub mod routing;
pub mod session;

// Cross-cutting concerns
pub mod admin;
pub mod identity;
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use dispatch::{Dispatch, UpgradeDispatcher};
pub use endpoint::EndpointRegistry;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
