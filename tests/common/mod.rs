//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use upgrade_gateway::config::{EndpointConfig, GatewayConfig, HandlerKind, TokenConfig};
use upgrade_gateway::dispatch::UpgradeDispatcher;
use upgrade_gateway::endpoint::EndpointRegistry;
use upgrade_gateway::http::build_router;
use upgrade_gateway::identity::{self, IdentityBridge, SecurityIdentity, TokenAuthenticator};
use upgrade_gateway::lifecycle::ContainerLifecycle;
use upgrade_gateway::negotiation::{ConnectionConfig, HandshakeContext, Transport};
use upgrade_gateway::session::{SessionFactory, SessionHandle, SessionId};

pub const ALICE_TOKEN: &str = "alice-token";

/// Echo on `/echo`, room broadcast on `/chat/{room}`, one known bearer token.
pub fn gateway_config(addr: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = addr.to_string();
    config.shutdown.drain_timeout_secs = 2;
    config.endpoints = vec![
        EndpointConfig {
            name: "echo".into(),
            path: "/echo".into(),
            handler: HandlerKind::Echo,
            versions: vec![13, 8, 7],
            subprotocols: Vec::new(),
            max_message_bytes: 64 * 1024,
            group_param: None,
        },
        EndpointConfig {
            name: "chat".into(),
            path: "/chat/{room}".into(),
            handler: HandlerKind::Broadcast,
            versions: vec![13],
            subprotocols: vec!["chat.v1".into(), "chat.v2".into()],
            max_message_bytes: 64 * 1024,
            group_param: Some("room".into()),
        },
    ];
    config.identity.tokens.push(TokenConfig {
        token: ALICE_TOKEN.into(),
        principal: "alice".into(),
        roles: vec!["user".into()],
    });
    config
}

/// Serve a router built from `config` with a custom lifecycle and session factory.
pub async fn start_with_parts(
    config: &GatewayConfig,
    lifecycle: Arc<dyn ContainerLifecycle>,
    sessions: Arc<dyn SessionFactory>,
) {
    let registry = Arc::new(EndpointRegistry::from_config(&config.endpoints).unwrap());
    let dispatcher = Arc::new(UpgradeDispatcher::new(
        registry,
        IdentityBridge::default(),
        lifecycle,
        sessions,
    ));
    let authenticator = Arc::new(TokenAuthenticator::from_config(&config.identity.tokens));
    let app = build_router(config, dispatcher, authenticator);

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
}

/// What a [`RecordingSessions`] saw on one `connected` call.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub ctx: HandshakeContext,
    pub ambient: Option<SecurityIdentity>,
    pub endpoint: String,
    pub subprotocol: Option<String>,
}

/// Session factory that records each handoff and keeps the socket open.
#[derive(Default)]
pub struct RecordingSessions {
    calls: Mutex<Vec<Recorded>>,
    transports: Mutex<Vec<Transport>>,
}

impl RecordingSessions {
    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }
}

impl SessionFactory for RecordingSessions {
    fn connected(
        &self,
        transport: Transport,
        config: ConnectionConfig,
        subprotocol: Option<String>,
        ctx: HandshakeContext,
    ) -> SessionHandle {
        self.calls.lock().unwrap().push(Recorded {
            ctx,
            ambient: identity::current(),
            endpoint: config.endpoint.clone(),
            subprotocol,
        });
        self.transports.lock().unwrap().push(transport);
        SessionHandle {
            id: SessionId::new(),
            endpoint: config.endpoint,
        }
    }
}

/// Lifecycle that never shuts down.
pub struct Running;

impl ContainerLifecycle for Running {
    fn is_shutting_down(&self) -> bool {
        false
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn wait_until(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
