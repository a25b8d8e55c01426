//! Bearer token authentication middleware.
//! Establishes the request identity before the upgrade dispatcher runs.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};

use crate::config::TokenConfig;
use crate::identity::{Principal, SecurityIdentity};

/// Identity attached to authenticated requests.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub identity: SecurityIdentity,
}

/// Static token table built from configuration.
#[derive(Debug, Default)]
pub struct TokenAuthenticator {
    tokens: HashMap<String, SecurityIdentity>,
}

impl TokenAuthenticator {
    pub fn from_config(tokens: &[TokenConfig]) -> Self {
        let tokens = tokens
            .iter()
            .map(|t| {
                (
                    t.token.clone(),
                    SecurityIdentity::authenticated(Principal::new(&t.principal), t.roles.clone()),
                )
            })
            .collect();
        Self { tokens }
    }

    pub fn authenticate(&self, token: &str) -> Option<&SecurityIdentity> {
        self.tokens.get(token)
    }
}

/// Attach an [`AuthenticatedUser`] for known bearer tokens.
///
/// Never rejects: requests without a usable token continue anonymously.
pub async fn bearer_auth_middleware(
    State(authenticator): State<Arc<TokenAuthenticator>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    if let Some(token) = token {
        match authenticator.authenticate(token) {
            Some(identity) => {
                let user = AuthenticatedUser {
                    identity: identity.clone(),
                };
                req.extensions_mut().insert(user);
            }
            None => {
                tracing::warn!(path = %req.uri().path(), "Unknown bearer token, continuing anonymously");
            }
        }
    }

    next.run(req).await
}
