//! Request-scoped execution context for one upgrade attempt.

use axum::body::Body;
use axum::http::Request;
use tracing::Span;

use crate::http::X_REQUEST_ID;

/// Per-request scope opened once a negotiator has been chosen.
///
/// The scope is a tracing span plus the request id. It is entered for the
/// synchronous part of the handshake and cloned into the completion, which
/// re-enters it on whatever task it runs.
#[derive(Debug, Clone)]
pub struct RequestScope {
    request_id: String,
    span: Span,
}

impl RequestScope {
    pub fn open(req: &Request<Body>, endpoint: &str, negotiator: &str) -> Self {
        let request_id = req
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let span = tracing::info_span!(
            "upgrade",
            request_id = %request_id,
            endpoint = %endpoint,
            negotiator = %negotiator,
        );

        Self { request_id, span }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_incoming_request_id() {
        let req = Request::builder()
            .header(X_REQUEST_ID, "abc-123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(RequestScope::open(&req, "chat", "hybi-13").request_id(), "abc-123");

        let req = Request::builder().body(Body::empty()).unwrap();
        let generated = RequestScope::open(&req, "chat", "hybi-13");
        assert!(uuid::Uuid::parse_str(generated.request_id()).is_ok());
    }
}
