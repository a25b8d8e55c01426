//! Session lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! Completion (after upgrade)
//!     → SessionFactory::connected (exactly once per handshake)
//!     → registry.rs (assign id, record SessionInfo, join group)
//!     → driver task: ping/idle checks, handler.rs replies, group fan-out
//!     → on close/shutdown: deregister, leave group
//! ```
//!
//! # Design Decisions
//! - connected() never blocks: it registers and spawns the driver
//! - Sessions are tracked in a DashMap keyed by SessionId
//! - Broadcast groups are tokio broadcast channels created on demand and
//!   removed when their last session leaves

pub mod handler;
pub mod registry;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::identity::Principal;
use crate::negotiation::{ConnectionConfig, HandshakeContext, Transport};

pub use handler::{BroadcastHandler, EchoHandler, EndpointHandler, Reply};
pub use registry::SessionRegistry;

/// Global atomic counter for session IDs.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Generate a new unique session ID.
    pub fn new() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Returned to the dispatcher once a session is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: SessionId,
    pub endpoint: String,
}

/// Metadata kept for every live session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub endpoint: String,
    pub path: String,
    pub path_params: HashMap<String, String>,
    pub principal: Option<Principal>,
    pub subprotocol: Option<String>,
    pub group: Option<String>,
    /// Seconds since the Unix epoch.
    pub connected_at: u64,
}

/// Takes ownership of negotiated connections.
pub trait SessionFactory: Send + Sync {
    fn connected(
        &self,
        transport: Transport,
        config: ConnectionConfig,
        subprotocol: Option<String>,
        ctx: HandshakeContext,
    ) -> SessionHandle;
}
