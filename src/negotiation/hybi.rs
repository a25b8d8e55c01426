//! HTTP/1.1 upgrade handshakes for RFC 6455 and hybi drafts 07/08.
//!
//! # Responsibilities
//! - Recognize upgrade requests for one `Sec-WebSocket-Version`
//! - Compute `Sec-WebSocket-Accept` and pick a sub-protocol
//! - Take over the connection once hyper hands it back
//!
//! # Design Decisions
//! - One negotiator per version; the endpoint orders them
//! - Drafts 07 and 08 use the same accept-key derivation as RFC 6455;
//!   they differ only in the origin header they send
//! - Upgrade failures after the 101 is written are logged here, not returned

use axum::{
    body::Body,
    http::{
        header::{
            HeaderName, CONNECTION, ORIGIN, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_PROTOCOL,
            SEC_WEBSOCKET_VERSION, UPGRADE,
        },
        HeaderMap, Method, Request, StatusCode,
    },
    response::{IntoResponse, Response},
};
use hyper_util::rt::TokioIo;
use tokio_tungstenite::{
    tungstenite::{
        handshake::derive_accept_key,
        protocol::{Role, WebSocketConfig},
    },
    WebSocketStream,
};
use tracing::Instrument;

use crate::negotiation::{
    subprotocol, Completion, ConnectionConfig, HandshakeContext, HandshakeNegotiator, WebSocketVersion,
};

const SEC_WEBSOCKET_ORIGIN: HeaderName = HeaderName::from_static("sec-websocket-origin");

/// Handshake for a single WebSocket protocol version.
#[derive(Debug, Clone)]
pub struct HybiHandshake {
    name: String,
    config: ConnectionConfig,
}

impl HybiHandshake {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            name: config.version.to_string(),
            config,
        }
    }

    pub fn version(&self) -> WebSocketVersion {
        self.config.version
    }

    /// Origin header for this draft.
    fn origin<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        let name = match self.config.version {
            WebSocketVersion::V13 => ORIGIN,
            WebSocketVersion::V08 | WebSocketVersion::V07 => SEC_WEBSOCKET_ORIGIN,
        };
        headers.get(name).and_then(|v| v.to_str().ok())
    }
}

fn header_is(headers: &HeaderMap, name: HeaderName, expected: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

fn header_has_token(headers: &HeaderMap, name: HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}

impl HandshakeNegotiator for HybiHandshake {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn matches(&self, req: &Request<Body>) -> bool {
        let headers = req.headers();
        req.method() == Method::GET
            && header_is(headers, UPGRADE, "websocket")
            && header_has_token(headers, CONNECTION, "upgrade")
            && header_is(headers, SEC_WEBSOCKET_VERSION, self.config.version.header_value())
    }

    fn handshake(&self, mut req: Request<Body>, ctx: &HandshakeContext, completion: Completion) -> Response {
        let Some(key) = req.headers().get(SEC_WEBSOCKET_KEY).filter(|k| !k.is_empty()) else {
            tracing::warn!(
                request_id = %ctx.request_id,
                negotiator = %self.name,
                "Rejecting handshake without Sec-WebSocket-Key"
            );
            return (StatusCode::BAD_REQUEST, "Missing Sec-WebSocket-Key").into_response();
        };
        let accept = derive_accept_key(key.as_bytes());

        let offered = subprotocol::offered(req.headers());
        let chosen = subprotocol::select(&offered, &self.config.subprotocols);

        tracing::debug!(
            request_id = %ctx.request_id,
            negotiator = %self.name,
            origin = self.origin(req.headers()).unwrap_or("-"),
            subprotocol = chosen.as_deref().unwrap_or("-"),
            "Performing handshake"
        );

        let mut response = Response::builder()
            .status(StatusCode::SWITCHING_PROTOCOLS)
            .header(UPGRADE, "websocket")
            .header(CONNECTION, "Upgrade")
            .header(SEC_WEBSOCKET_ACCEPT, accept);
        if let Some(protocol) = &chosen {
            response = response.header(SEC_WEBSOCKET_PROTOCOL, protocol.as_str());
        }
        let response = match response.body(Body::empty()) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, negotiator = %self.name, "Failed to build handshake response");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let on_upgrade = hyper::upgrade::on(&mut req);
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_bytes);
        let negotiator = self.name.clone();

        tokio::spawn(
            async move {
                match on_upgrade.await {
                    Ok(upgraded) => {
                        let transport =
                            WebSocketStream::from_raw_socket(TokioIo::new(upgraded), Role::Server, Some(ws_config))
                                .await;
                        completion.connected(transport, chosen).await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, negotiator = %negotiator, "Connection upgrade failed");
                    }
                }
            }
            .instrument(tracing::Span::current()),
        );

        response
    }
}
