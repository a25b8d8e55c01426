//! Responses written by the gateway itself.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Terminal rejection used while the gateway is shutting down. Empty body.
pub fn service_unavailable() -> Response {
    StatusCode::SERVICE_UNAVAILABLE.into_response()
}

/// Fallback for plain HTTP requests no route handles.
pub async fn not_found() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

pub async fn health() -> &'static str {
    "ok"
}
