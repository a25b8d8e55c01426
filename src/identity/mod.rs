//! Identity propagation into upgraded connections.
//!
//! # Data Flow
//! ```text
//! auth.rs (bearer token → AuthenticatedUser request extension)
//!     → IdentityBridge::resolve (established identity, or anonymous)
//!     → HandshakeContext (explicit value)
//!     → scope()/sync_scope() re-establish it around handshake and completion
//! ```
//!
//! # Design Decisions
//! - The ambient identity is never unset: missing credentials mean anonymous
//! - Resolution never fails and never declines a handshake
//! - Task-local storage instead of thread-local, so the identity follows the
//!   completion future onto whichever worker thread polls it

pub mod auth;

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use serde::Serialize;

pub use auth::{bearer_auth_middleware, AuthenticatedUser, TokenAuthenticator};

tokio::task_local! {
    static CURRENT_IDENTITY: SecurityIdentity;
}

/// Name of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identity considered current while a request is processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityIdentity {
    principal: Option<Principal>,
    roles: BTreeSet<String>,
}

impl SecurityIdentity {
    /// An authenticated identity.
    pub fn authenticated(principal: Principal, roles: impl IntoIterator<Item = String>) -> Self {
        Self {
            principal: Some(principal),
            roles: roles.into_iter().collect(),
        }
    }

    /// The identity used for requests without credentials.
    pub fn anonymous() -> Self {
        Self {
            principal: None,
            roles: BTreeSet::new(),
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.principal.is_none()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }
}

/// Security collaborator that knows how identities are attached to requests.
pub trait IdentityAssociation: Send + Sync {
    /// The identity already established for this request, if any.
    fn current_identity(&self, req: &Request<Body>) -> Option<SecurityIdentity>;

    /// The identity used when the request carries none.
    fn anonymous_identity(&self, _req: &Request<Body>) -> SecurityIdentity {
        SecurityIdentity::anonymous()
    }
}

/// Reads the `AuthenticatedUser` extension placed by [`bearer_auth_middleware`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtensionAssociation;

impl IdentityAssociation for ExtensionAssociation {
    fn current_identity(&self, req: &Request<Body>) -> Option<SecurityIdentity> {
        req.extensions()
            .get::<AuthenticatedUser>()
            .map(|user| user.identity.clone())
    }
}

/// Outcome of identity resolution for one upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub identity: SecurityIdentity,
    /// Only set when the request carried an established identity.
    pub principal: Option<Principal>,
}

/// Resolves the ambient identity for an upgrade request.
#[derive(Clone)]
pub struct IdentityBridge {
    association: Option<Arc<dyn IdentityAssociation>>,
}

impl IdentityBridge {
    pub fn new(association: Arc<dyn IdentityAssociation>) -> Self {
        Self {
            association: Some(association),
        }
    }

    /// A bridge with no security collaborator; every request is anonymous.
    pub fn disabled() -> Self {
        Self { association: None }
    }

    pub fn resolve(&self, req: &Request<Body>) -> ResolvedIdentity {
        let Some(association) = &self.association else {
            return ResolvedIdentity {
                identity: SecurityIdentity::anonymous(),
                principal: None,
            };
        };

        match association.current_identity(req) {
            Some(identity) => ResolvedIdentity {
                principal: identity.principal().cloned(),
                identity,
            },
            None => ResolvedIdentity {
                identity: association.anonymous_identity(req),
                principal: None,
            },
        }
    }
}

impl Default for IdentityBridge {
    fn default() -> Self {
        Self::new(Arc::new(ExtensionAssociation))
    }
}

/// The ambient identity of the running task, if one was established.
pub fn current() -> Option<SecurityIdentity> {
    CURRENT_IDENTITY.try_with(Clone::clone).ok()
}

/// Run `fut` with `identity` as the ambient identity.
pub async fn scope<F: Future>(identity: SecurityIdentity, fut: F) -> F::Output {
    CURRENT_IDENTITY.scope(identity, fut).await
}

/// Run synchronous code with `identity` as the ambient identity.
pub fn sync_scope<R>(identity: SecurityIdentity, f: impl FnOnce() -> R) -> R {
    CURRENT_IDENTITY.sync_scope(identity, f)
}
