//! Operator API: read-only views of endpoints and live sessions.
//!
//! Served on its own listener so it can stay bound to loopback while the
//! gateway listens publicly. Every route requires `Authorization: Bearer <api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;

use crate::endpoint::EndpointRegistry;
use crate::lifecycle::{ContainerLifecycle, Shutdown};
use crate::session::SessionRegistry;

use self::auth::admin_auth_middleware;
use self::handlers::*;

#[derive(Clone)]
pub struct AdminState {
    pub(crate) api_key: Arc<str>,
    pub(crate) registry: Arc<EndpointRegistry>,
    pub(crate) sessions: SessionRegistry,
    pub(crate) shutdown: Shutdown,
    pub(crate) started_at: Instant,
}

impl AdminState {
    pub fn new(
        api_key: &str,
        registry: Arc<EndpointRegistry>,
        sessions: SessionRegistry,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            api_key: Arc::from(api_key),
            registry,
            sessions,
            shutdown,
            started_at: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/endpoints", get(get_endpoints))
        .route("/admin/sessions", get(get_sessions))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin router until shutdown is triggered.
pub async fn serve(listener: TcpListener, state: AdminState) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    let mut shutdown_rx = shutdown.subscribe();
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            if !shutdown.is_shutting_down() {
                let _ = shutdown_rx.recv().await;
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointConfig, HandlerKind, SessionConfig};
    use axum::body::Body;
    use axum::http::{header::AUTHORIZATION, Request, StatusCode};
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn state(shutdown: Shutdown) -> AdminState {
        let endpoints = vec![EndpointConfig {
            name: "chat".into(),
            path: "/chat/{room}".into(),
            handler: HandlerKind::Broadcast,
            versions: vec![13, 8],
            subprotocols: Vec::new(),
            max_message_bytes: 1024,
            group_param: Some("room".into()),
        }];
        let registry = Arc::new(EndpointRegistry::from_config(&endpoints).unwrap());
        let sessions = SessionRegistry::new(SessionConfig::default(), HashMap::new(), shutdown.clone());
        AdminState::new("secret", registry, sessions, shutdown)
    }

    async fn get_json(router: Router, uri: &str, key: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut req = Request::builder().uri(uri);
        if let Some(key) = key {
            req = req.header(AUTHORIZATION, format!("Bearer {}", key));
        }
        let res = router.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), 64 * 1024).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_requires_api_key() {
        let router = setup_admin_router(state(Shutdown::new()));
        let (status, _) = get_json(router.clone(), "/admin/status", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = get_json(router, "/admin/status", Some("wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_lists_endpoints_and_status() {
        let shutdown = Shutdown::new();
        let router = setup_admin_router(state(shutdown.clone()));

        let (status, json) = get_json(router.clone(), "/admin/endpoints", Some("secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["name"], "chat");
        assert_eq!(json[0]["path"], "/chat/{room}");
        assert_eq!(json[0]["negotiators"][1], "hybi-08");

        let (_, json) = get_json(router.clone(), "/admin/sessions", Some("secret")).await;
        assert_eq!(json, serde_json::json!([]));

        let (_, json) = get_json(router.clone(), "/admin/status", Some("secret")).await;
        assert_eq!(json["status"], "operational");
        assert_eq!(json["endpoints"], 1);

        shutdown.trigger();
        let (_, json) = get_json(router, "/admin/status", Some("secret")).await;
        assert_eq!(json["status"], "shutting_down");
    }
}
