//! The upgrade dispatcher state machine.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{header::UPGRADE, Request},
    response::Response,
};
use tokio_tungstenite::tungstenite::{
    protocol::{frame::coding::CloseCode, CloseFrame},
    Utf8Bytes,
};
use tracing::{Instrument, Span};

use crate::dispatch::RequestScope;
use crate::endpoint::EndpointRegistry;
use crate::http::response;
use crate::identity::{self, IdentityBridge};
use crate::lifecycle::ContainerLifecycle;
use crate::negotiation::{self, Completion, ConnectionConfig, HandshakeContext};
use crate::observability::metrics;
use crate::session::SessionFactory;

/// What the host pipeline should do with a request after dispatch.
#[derive(Debug)]
pub enum Dispatch {
    /// Not ours; continue with the original, unmodified request.
    PassThrough(Request<Body>),
    /// The dispatcher (or the chosen negotiator) produced the response.
    Respond(Response),
}

/// Terminal states of a dispatch, used for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    NoUpgradeIntent,
    NoPathMatch,
    NoNegotiator,
    ShuttingDown,
    Accepted,
}

impl DispatchOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoUpgradeIntent => "no_upgrade_intent",
            Self::NoPathMatch => "no_path_match",
            Self::NoNegotiator => "no_negotiator",
            Self::ShuttingDown => "shutting_down",
            Self::Accepted => "accepted",
        }
    }
}

/// Routes upgrade requests to endpoint negotiators and hands the resulting
/// connections to the session factory.
pub struct UpgradeDispatcher {
    registry: Arc<EndpointRegistry>,
    identity: IdentityBridge,
    lifecycle: Arc<dyn ContainerLifecycle>,
    sessions: Arc<dyn SessionFactory>,
}

impl UpgradeDispatcher {
    pub fn new(
        registry: Arc<EndpointRegistry>,
        identity: IdentityBridge,
        lifecycle: Arc<dyn ContainerLifecycle>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        Self {
            registry,
            identity,
            lifecycle,
            sessions,
        }
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    pub fn dispatch(&self, req: Request<Body>) -> Dispatch {
        // InterceptCheck: requests without upgrade intent leave no trace.
        if !req.headers().contains_key(UPGRADE) {
            return Dispatch::PassThrough(req);
        }
        let start = Instant::now();

        // PathLookup
        let path = normalize(req.uri().path());
        let Some(matched) = self.registry.match_path(&path) else {
            return decline(req, DispatchOutcome::NoPathMatch, &path);
        };
        let registration = matched.value;

        // NegotiationLoop
        let outcome = negotiation::select(registration.negotiators(), &req);
        let Some(negotiator) = outcome.negotiator else {
            return decline(req, DispatchOutcome::NoNegotiator, &path);
        };

        if self.lifecycle.is_shutting_down() {
            tracing::info!(
                endpoint = registration.name(),
                path = %path,
                "Rejecting upgrade, gateway is shutting down"
            );
            metrics::record_upgrade_outcome(DispatchOutcome::ShuttingDown.as_str());
            return Dispatch::Respond(response::service_unavailable());
        }

        // Accepted: everything below runs inside the request scope.
        let scope = RequestScope::open(&req, registration.name(), negotiator.name());
        let _entered = scope.span().enter();

        let resolved = self.identity.resolve(&req);
        tracing::debug!(
            principal = resolved.principal.as_ref().map(|p| p.name()).unwrap_or("anonymous"),
            "Request scope activated"
        );

        let ctx = HandshakeContext {
            request_id: scope.request_id().to_string(),
            endpoint: registration.name().to_string(),
            path,
            path_params: matched.parameters,
            principal: resolved.principal,
            identity: resolved.identity,
        };

        let completion = self.completion(negotiator.config().clone(), ctx.clone(), scope.span().clone());
        let response = identity::sync_scope(ctx.identity.clone(), || negotiator.handshake(req, &ctx, completion));

        metrics::record_upgrade_outcome(DispatchOutcome::Accepted.as_str());
        metrics::record_handshake_duration(registration.name(), start);
        tracing::debug!(status = %response.status(), "Request scope deactivated");

        Dispatch::Respond(response)
    }

    /// Continuation run by the negotiator once the connection is upgraded.
    ///
    /// Re-enters the request span and the ambient identity on whichever task
    /// it runs, and re-checks shutdown before any session state is created.
    fn completion(&self, config: ConnectionConfig, ctx: HandshakeContext, span: Span) -> Completion {
        let lifecycle = self.lifecycle.clone();
        let sessions = self.sessions.clone();

        Completion::new(move |mut transport, subprotocol| {
            let identity = ctx.identity.clone();
            let handoff = async move {
                if lifecycle.is_shutting_down() {
                    tracing::info!("Shutdown observed before session handoff, closing connection");
                    metrics::record_upgrade_outcome("aborted_shutdown");
                    let frame = CloseFrame {
                        code: CloseCode::Away,
                        reason: Utf8Bytes::from_static("server shutting down"),
                    };
                    if let Err(e) = transport.close(Some(frame)).await {
                        tracing::debug!(error = %e, "Close after aborted handoff failed");
                    }
                    return;
                }

                let handle = sessions.connected(transport, config, subprotocol, ctx);
                tracing::debug!(session_id = %handle.id, "Session handed off");
            };
            identity::scope(identity, handoff.instrument(span))
        })
    }
}

fn normalize(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn decline(req: Request<Body>, outcome: DispatchOutcome, path: &str) -> Dispatch {
    tracing::debug!(path = %path, outcome = outcome.as_str(), "Upgrade declined, passing through");
    metrics::record_upgrade_outcome(outcome.as_str());
    Dispatch::PassThrough(req)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointRegistration;
    use crate::identity::{AuthenticatedUser, Principal, SecurityIdentity};
    use crate::negotiation::{HandshakeNegotiator, Transport, WebSocketVersion};
    use crate::routing::PathTemplate;
    use crate::session::{SessionHandle, SessionId};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeNegotiator {
        name: String,
        config: ConnectionConfig,
        accept: bool,
        asked: AtomicUsize,
        invoked: AtomicUsize,
        seen: Mutex<Option<(HandshakeContext, Option<SecurityIdentity>)>>,
    }

    impl FakeNegotiator {
        fn new(name: &str, accept: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                config: ConnectionConfig {
                    endpoint: "chat".into(),
                    version: WebSocketVersion::V13,
                    subprotocols: vec![name.to_string()],
                    max_message_bytes: 1024,
                },
                accept,
                asked: AtomicUsize::new(0),
                invoked: AtomicUsize::new(0),
                seen: Mutex::new(None),
            })
        }

        fn asked(&self) -> usize {
            self.asked.load(Ordering::SeqCst)
        }

        fn invoked(&self) -> usize {
            self.invoked.load(Ordering::SeqCst)
        }
    }

    impl HandshakeNegotiator for FakeNegotiator {
        fn name(&self) -> &str {
            &self.name
        }

        fn config(&self) -> &ConnectionConfig {
            &self.config
        }

        fn matches(&self, _req: &Request<Body>) -> bool {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.accept
        }

        fn handshake(&self, _req: Request<Body>, ctx: &HandshakeContext, _completion: Completion) -> Response {
            self.invoked.fetch_add(1, Ordering::SeqCst);
            *self.seen.lock().unwrap() = Some((ctx.clone(), identity::current()));
            StatusCode::SWITCHING_PROTOCOLS.into_response()
        }
    }

    struct Closing(AtomicBool);

    impl ContainerLifecycle for Closing {
        fn is_shutting_down(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct CountingSessions(AtomicUsize);

    impl SessionFactory for CountingSessions {
        fn connected(
            &self,
            _transport: Transport,
            config: ConnectionConfig,
            _subprotocol: Option<String>,
            _ctx: HandshakeContext,
        ) -> SessionHandle {
            self.0.fetch_add(1, Ordering::SeqCst);
            SessionHandle {
                id: SessionId::new(),
                endpoint: config.endpoint,
            }
        }
    }

    fn dispatcher(negotiators: &[Arc<FakeNegotiator>], closing: bool) -> UpgradeDispatcher {
        let mut registration = EndpointRegistration::new("chat", PathTemplate::parse("/chat/{room}").unwrap());
        for n in negotiators {
            registration = registration.with_negotiator(n.clone());
        }
        let mut builder = EndpointRegistry::builder();
        builder.register(registration);

        UpgradeDispatcher::new(
            Arc::new(builder.seal().unwrap()),
            IdentityBridge::default(),
            Arc::new(Closing(AtomicBool::new(closing))),
            Arc::new(CountingSessions::default()),
        )
    }

    fn upgrade(path: &str) -> Request<Body> {
        Request::builder()
            .uri(path)
            .header(UPGRADE, "websocket")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_no_upgrade_header_passes_through_untouched() {
        let n = FakeNegotiator::new("n1", true);
        let d = dispatcher(&[n.clone()], false);
        let req = Request::builder()
            .uri("/chat/lobby")
            .header("x-custom", "kept")
            .body(Body::empty())
            .unwrap();

        match d.dispatch(req) {
            Dispatch::PassThrough(req) => {
                assert_eq!(req.uri(), "/chat/lobby");
                assert_eq!(req.headers().get("x-custom").unwrap(), "kept");
                assert_eq!(req.headers().len(), 1);
            }
            Dispatch::Respond(_) => panic!("expected pass-through"),
        }
        assert_eq!(n.asked(), 0);
    }

    #[test]
    fn test_matching_path_invokes_negotiator_with_parameters() {
        let n = FakeNegotiator::new("n1", true);
        let d = dispatcher(&[n.clone()], false);

        match d.dispatch(upgrade("/chat/lobby")) {
            Dispatch::Respond(res) => assert_eq!(res.status(), StatusCode::SWITCHING_PROTOCOLS),
            Dispatch::PassThrough(_) => panic!("expected handshake"),
        }
        assert_eq!(n.invoked(), 1);

        let (ctx, ambient) = n.seen.lock().unwrap().clone().unwrap();
        assert_eq!(ctx.endpoint, "chat");
        assert_eq!(ctx.path, "/chat/lobby");
        assert_eq!(ctx.path_params.get("room").map(String::as_str), Some("lobby"));
        assert!(ctx.principal.is_none());
        assert!(ctx.identity.is_anonymous());
        assert_eq!(ambient, Some(SecurityIdentity::anonymous()));
    }

    #[test]
    fn test_unmatched_path_passes_through() {
        let n = FakeNegotiator::new("n1", true);
        let d = dispatcher(&[n.clone()], false);

        assert!(matches!(d.dispatch(upgrade("/other")), Dispatch::PassThrough(_)));
        assert_eq!(n.asked(), 0);
        assert_eq!(n.invoked(), 0);
    }

    #[test]
    fn test_first_accepting_negotiator_wins() {
        let first = FakeNegotiator::new("first", false);
        let second = FakeNegotiator::new("second", true);
        let third = FakeNegotiator::new("third", true);
        let d = dispatcher(&[first.clone(), second.clone(), third.clone()], false);

        assert!(matches!(d.dispatch(upgrade("/chat/lobby")), Dispatch::Respond(_)));
        assert_eq!(first.asked(), 1);
        assert_eq!(first.invoked(), 0);
        assert_eq!(second.invoked(), 1);
        assert_eq!(third.asked(), 0);
        assert_eq!(third.invoked(), 0);
    }

    #[test]
    fn test_no_accepting_negotiator_passes_through() {
        let first = FakeNegotiator::new("first", false);
        let second = FakeNegotiator::new("second", false);
        let d = dispatcher(&[first.clone(), second.clone()], false);

        assert!(matches!(d.dispatch(upgrade("/chat/lobby")), Dispatch::PassThrough(_)));
        assert_eq!(first.asked(), 1);
        assert_eq!(second.asked(), 1);
    }

    #[tokio::test]
    async fn test_shutting_down_rejects_with_empty_503() {
        let n = FakeNegotiator::new("n1", true);
        let d = dispatcher(&[n.clone()], true);

        let res = match d.dispatch(upgrade("/chat/lobby")) {
            Dispatch::Respond(res) => res,
            Dispatch::PassThrough(_) => panic!("expected rejection"),
        };
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(res.into_body(), 1024).await.unwrap();
        assert!(body.is_empty());
        assert_eq!(n.asked(), 1);
        assert_eq!(n.invoked(), 0);
    }

    #[test]
    fn test_established_identity_is_visible_during_handshake() {
        let n = FakeNegotiator::new("n1", true);
        let d = dispatcher(&[n.clone()], false);
        let alice = SecurityIdentity::authenticated(Principal::new("alice"), Vec::new());

        let mut req = upgrade("/chat/lobby");
        req.extensions_mut().insert(AuthenticatedUser {
            identity: alice.clone(),
        });
        d.dispatch(req);

        let (ctx, ambient) = n.seen.lock().unwrap().clone().unwrap();
        assert_eq!(ctx.principal, Some(Principal::new("alice")));
        assert_eq!(ambient, Some(alice));
    }

    #[test]
    fn test_path_without_leading_slash_is_normalized() {
        assert_eq!(normalize("chat/lobby"), "/chat/lobby");
        assert_eq!(normalize("/chat"), "/chat");
    }
}
