use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::endpoint::registry::EndpointSummary;
use crate::lifecycle::ContainerLifecycle;
use crate::session::SessionInfo;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub endpoints: usize,
    pub active_sessions: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if state.shutdown.is_shutting_down() {
            "shutting_down"
        } else {
            "operational"
        },
        uptime_secs: state.started_at.elapsed().as_secs(),
        endpoints: state.registry.len(),
        active_sessions: state.sessions.len(),
    })
}

pub async fn get_endpoints(State(state): State<AdminState>) -> Json<Vec<EndpointSummary>> {
    Json(state.registry.summaries())
}

pub async fn get_sessions(State(state): State<AdminState>) -> Json<Vec<SessionInfo>> {
    Json(state.sessions.sessions())
}
