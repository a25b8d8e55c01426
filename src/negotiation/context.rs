//! Explicit per-handshake context and the completion continuation.

use std::collections::HashMap;
use std::future::Future;

use futures_util::future::BoxFuture;
use serde::Serialize;

use crate::identity::{Principal, SecurityIdentity};
use crate::negotiation::Transport;

/// Attachments carried from the dispatcher into the negotiator and session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandshakeContext {
    pub request_id: String,
    pub endpoint: String,
    pub path: String,
    pub path_params: HashMap<String, String>,
    /// Set only when the request carried an established identity.
    pub principal: Option<Principal>,
    /// Never unset; anonymous when no credentials were presented.
    pub identity: SecurityIdentity,
}

type Continuation = Box<dyn FnOnce(Transport, Option<String>) -> BoxFuture<'static, ()> + Send>;

/// Single-shot continuation run after the connection is upgraded.
pub struct Completion {
    run: Continuation,
}

impl Completion {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Transport, Option<String>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            run: Box::new(move |transport, subprotocol| Box::pin(f(transport, subprotocol))),
        }
    }

    /// Hand the upgraded transport and the chosen sub-protocol onwards.
    pub async fn connected(self, transport: Transport, subprotocol: Option<String>) {
        (self.run)(transport, subprotocol).await
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Completion")
    }
}
