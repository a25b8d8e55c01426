//! Handshake negotiation subsystem.
//!
//! # Data Flow
//! ```text
//! Matched endpoint → ordered negotiators
//!     → matches() on each, first acceptance wins
//!     → handshake() writes the 101 response and spawns the upgrade
//!     → Completion runs once the raw connection is taken over
//! ```
//!
//! # Design Decisions
//! - Negotiators are trait objects in a fixed, ordered Vec (no inheritance)
//! - A negotiator owns its error path: a malformed handshake is answered by
//!   the negotiator itself and never surfaces to the dispatcher
//! - Frame encoding is delegated to tokio-tungstenite

pub mod context;
pub mod hybi;
pub mod subprotocol;

use std::fmt;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio_tungstenite::WebSocketStream;

pub use context::{Completion, HandshakeContext};
pub use hybi::HybiHandshake;

/// The upgraded connection handed to the session layer.
pub type Transport = WebSocketStream<TokioIo<Upgraded>>;

/// WebSocket protocol drafts the gateway can negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WebSocketVersion {
    /// RFC 6455.
    V13,
    /// hybi draft 08.
    V08,
    /// hybi draft 07.
    V07,
}

impl WebSocketVersion {
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            13 => Some(Self::V13),
            8 => Some(Self::V08),
            7 => Some(Self::V07),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Self::V13 => 13,
            Self::V08 => 8,
            Self::V07 => 7,
        }
    }

    /// Value of the `Sec-WebSocket-Version` header for this version.
    pub fn header_value(self) -> &'static str {
        match self {
            Self::V13 => "13",
            Self::V08 => "8",
            Self::V07 => "7",
        }
    }
}

impl fmt::Display for WebSocketVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hybi-{:02}", self.number())
    }
}

/// What a negotiator agrees to when it accepts a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionConfig {
    /// Endpoint the connection belongs to.
    pub endpoint: String,
    pub version: WebSocketVersion,
    /// Server-supported sub-protocols.
    pub subprotocols: Vec<String>,
    pub max_message_bytes: usize,
}

/// A strategy that can take over an upgrade request.
pub trait HandshakeNegotiator: Send + Sync {
    fn name(&self) -> &str;

    fn config(&self) -> &ConnectionConfig;

    /// Whether this negotiator can service the request. Must not mutate anything.
    fn matches(&self, req: &Request<Body>) -> bool;

    /// Perform the handshake and return the response to send.
    ///
    /// `completion` is invoked at most once, after the connection is upgraded.
    fn handshake(&self, req: Request<Body>, ctx: &HandshakeContext, completion: Completion) -> Response;
}

/// Result of the selection loop for one request.
#[derive(Clone)]
pub struct NegotiationOutcome {
    pub accepted: bool,
    pub negotiator: Option<std::sync::Arc<dyn HandshakeNegotiator>>,
    pub config: Option<ConnectionConfig>,
    pub principal: Option<crate::identity::Principal>,
}

impl NegotiationOutcome {
    pub fn declined() -> Self {
        Self {
            accepted: false,
            negotiator: None,
            config: None,
            principal: None,
        }
    }
}

impl fmt::Debug for NegotiationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiationOutcome")
            .field("accepted", &self.accepted)
            .field("negotiator", &self.negotiator.as_ref().map(|n| n.name().to_string()))
            .field("config", &self.config)
            .field("principal", &self.principal)
            .finish()
    }
}

/// Pick the first negotiator, in order, that accepts the request.
pub fn select(
    negotiators: &[std::sync::Arc<dyn HandshakeNegotiator>],
    req: &Request<Body>,
) -> NegotiationOutcome {
    match negotiators.iter().find(|n| n.matches(req)) {
        Some(n) => NegotiationOutcome {
            accepted: true,
            config: Some(n.config().clone()),
            negotiator: Some(n.clone()),
            principal: None,
        },
        None => NegotiationOutcome::declined(),
    }
}
