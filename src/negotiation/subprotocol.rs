//! Sub-protocol selection.

use axum::http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderMap};

/// Sub-protocols offered by the client, in the client's preference order.
pub fn offered(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// First client-offered sub-protocol the endpoint supports.
pub fn select(offered: &[String], supported: &[String]) -> Option<String> {
    offered.iter().find(|p| supported.contains(p)).cloned()
}
