//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the plain HTTP routes
//! - Wire up middleware (request ID, tracing, limits, identity, upgrades)
//! - Bind server to listener and stop on shutdown
//! - Drain WebSocket sessions after the listener closes

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::AdminState;
use crate::config::GatewayConfig;
use crate::dispatch::{upgrade_middleware, UpgradeDispatcher};
use crate::endpoint::{EndpointRegistry, RegistryError};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::response;
use crate::identity::{bearer_auth_middleware, IdentityBridge, TokenAuthenticator};
use crate::lifecycle::{ContainerLifecycle, Shutdown};
use crate::session::{handler::handlers_from_config, SessionRegistry};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("endpoint registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server hosting the upgrade dispatcher.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    dispatcher: Arc<UpgradeDispatcher>,
    sessions: SessionRegistry,
    shutdown: Shutdown,
}

impl GatewayServer {
    /// Create a new server; seals the endpoint registry from `config`.
    pub fn new(config: GatewayConfig, shutdown: Shutdown) -> Result<Self, ServerError> {
        let registry = Arc::new(EndpointRegistry::from_config(&config.endpoints)?);
        let sessions = SessionRegistry::new(
            config.sessions.clone(),
            handlers_from_config(&config.endpoints),
            shutdown.clone(),
        );
        let dispatcher = Arc::new(UpgradeDispatcher::new(
            registry,
            IdentityBridge::default(),
            Arc::new(shutdown.clone()),
            Arc::new(sessions.clone()),
        ));
        let authenticator = Arc::new(TokenAuthenticator::from_config(&config.identity.tokens));

        let router = build_router(&config, dispatcher.clone(), authenticator);
        Ok(Self {
            router,
            config,
            dispatcher,
            sessions,
            shutdown,
        })
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            endpoints = self.dispatcher.registry().len(),
            "HTTP server starting"
        );

        let shutdown = self.shutdown.clone();
        let mut shutdown_rx = shutdown.subscribe();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                if !shutdown.is_shutting_down() {
                    let _ = shutdown_rx.recv().await;
                }
            })
            .await?;

        let drain = Duration::from_secs(self.config.shutdown.drain_timeout_secs);
        let drained = self.sessions.drain(drain).await;
        tracing::info!(drained, "HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<UpgradeDispatcher> {
        &self.dispatcher
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// State for the admin API, sharing this server's registries.
    pub fn admin_state(&self) -> AdminState {
        AdminState::new(
            &self.config.admin.api_key,
            self.dispatcher.registry().clone(),
            self.sessions.clone(),
            self.shutdown.clone(),
        )
    }
}

/// Build the Axum router with all middleware layers.
///
/// Layers added later wrap earlier ones, so identity runs before the
/// upgrade dispatcher and request IDs are assigned before either.
#[allow(deprecated)]
pub fn build_router(
    config: &GatewayConfig,
    dispatcher: Arc<UpgradeDispatcher>,
    authenticator: Arc<TokenAuthenticator>,
) -> Router {
    Router::new()
        .route("/health", get(response::health))
        .fallback(response::not_found)
        .layer(middleware::from_fn_with_state(dispatcher, upgrade_middleware))
        .layer(middleware::from_fn_with_state(authenticator, bearer_auth_middleware))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(ConcurrencyLimitLayer::new(config.listener.max_connections))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(set_request_id_layer())
}
