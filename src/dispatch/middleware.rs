//! Axum adapter for the upgrade dispatcher.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::dispatch::{Dispatch, UpgradeDispatcher};

/// Run the dispatcher; declined requests continue down the pipeline untouched.
pub async fn upgrade_middleware(
    State(dispatcher): State<Arc<UpgradeDispatcher>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    match dispatcher.dispatch(req) {
        Dispatch::PassThrough(req) => next.run(req).await,
        Dispatch::Respond(response) => response,
    }
}
