//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID)
//!     → identity auth middleware (bearer token → AuthenticatedUser)
//!     → upgrade dispatcher (101 / 503 / pass through)
//!     → plain routes (/health) or response.rs fallback (404)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{build_router, GatewayServer, ServerError};
