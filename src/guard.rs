//! Route guard: per-request allow / deny decisions
//!
//! The caller's identity comes from an injected [`SessionProvider`] (or is
//! passed in directly with [`RouteGuard::decide`]). Privileged principals are
//! let through without a permission check. Any failure while resolving the
//! session or the graph denies with a 503, never allows.

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::constants::{CREATE, DELETE, READ, UPDATE, WRITE};
use crate::db::Store;
use crate::error::{RbacError, Result};
use crate::model::UserId;

/// Authenticated caller as reported by the session layer.
///
/// `roles` is informational; authorization always re-reads the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id, roles: Vec::new() }
    }
}

/// Resolves the principal of a request. `Ok(None)` means "no session".
pub trait SessionProvider<R: ?Sized> {
    fn principal(&self, request: &R) -> Result<Option<Principal>>;
}

impl<R: ?Sized, F> SessionProvider<R> for F
where
    F: Fn(&R) -> Result<Option<Principal>>,
{
    fn principal(&self, request: &R) -> Result<Option<Principal>> {
        self(request)
    }
}

/// Outcome of one guard evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Privileged role, permission check skipped
    Bypassed,
    Allowed,
    /// No session (401)
    Unauthenticated,
    /// Authenticated but lacking the permission (403)
    Forbidden,
    /// Session or store failure (503)
    Failed(RbacError),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Bypassed | Decision::Allowed)
    }

    /// `None` lets the request continue to its handler
    pub fn into_denial(self) -> Option<Denial> {
        match self {
            Decision::Bypassed | Decision::Allowed => None,
            Decision::Unauthenticated => Some(Denial::unauthenticated()),
            Decision::Forbidden => Some(Denial::forbidden()),
            Decision::Failed(_) => Some(Denial::unavailable()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialCode {
    Unauthenticated,
    Forbidden,
    AuthorizationUnavailable,
}

/// Response returned in place of the protected handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denial {
    #[serde(skip)]
    pub status: u16,
    pub code: DenialCode,
    pub error: String,
}

impl Denial {
    pub fn unauthenticated() -> Self {
        Denial { status: 401, code: DenialCode::Unauthenticated, error: "Authentication required".into() }
    }

    pub fn forbidden() -> Self {
        Denial { status: 403, code: DenialCode::Forbidden, error: "Insufficient permissions".into() }
    }

    pub fn unavailable() -> Self {
        Denial {
            status: 503,
            code: DenialCode::AuthorizationUnavailable,
            error: "Authorization service unavailable".into(),
        }
    }

    /// JSON body, `{"code": ..., "error": ...}`
    pub fn body(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"error\":\"{}\"}}", self.error))
    }
}

/// Gate invoked per protected request
pub struct RouteGuard<S> {
    store: Store,
    sessions: S,
}

impl<S> RouteGuard<S> {
    pub fn new(store: Store, sessions: S) -> Self {
        Self { store, sessions }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Decide for an already-resolved principal.
    ///
    /// The bypass follows the roles' `privileged` flag, which is set from
    /// `policy.privileged_roles` when a role is created. It does not look at
    /// the `admin` / `super-admin` names that `Store::is_admin` and
    /// `Store::is_super_admin` report on.
    pub fn decide(&self, principal: Option<&Principal>, action: &str, resource: &str) -> Decision {
        let Some(principal) = principal else {
            warn!(action, resource, "denied: no session");
            return Decision::Unauthenticated;
        };
        let user = principal.user_id;
        match self.store.resolve_grants(user) {
            Ok(g) if g.privileged => {
                debug!(user = %user, action, resource, "allowed: privileged role");
                Decision::Bypassed
            }
            Ok(g) if g.permissions.contains(action, resource) => {
                debug!(user = %user, action, resource, "allowed");
                Decision::Allowed
            }
            Ok(_) => {
                warn!(user = %user, action, resource, "denied: missing permission");
                Decision::Forbidden
            }
            Err(e) => {
                error!(user = %user, action, resource, error = %e, "authorization failed");
                Decision::Failed(e)
            }
        }
    }

    /// Resolve the session for `request`, then decide
    pub fn evaluate<R: ?Sized>(&self, request: &R, action: &str, resource: &str) -> Decision
    where
        S: SessionProvider<R>,
    {
        match self.sessions.principal(request) {
            Ok(p) => self.decide(p.as_ref(), action, resource),
            Err(e) => {
                error!(action, resource, error = %e, "session resolution failed");
                Decision::Failed(e)
            }
        }
    }

    /// `None` to continue, otherwise the denial to return instead of the handler
    pub fn protect_route<R: ?Sized>(&self, request: &R, action: &str, resource: &str) -> Option<Denial>
    where
        S: SessionProvider<R>,
    {
        self.evaluate(request, action, resource).into_denial()
    }

    pub fn protect_read_route<R: ?Sized>(&self, request: &R, resource: &str) -> Option<Denial>
    where
        S: SessionProvider<R>,
    {
        self.protect_route(request, READ, resource)
    }

    pub fn protect_write_route<R: ?Sized>(&self, request: &R, resource: &str) -> Option<Denial>
    where
        S: SessionProvider<R>,
    {
        self.protect_route(request, WRITE, resource)
    }

    pub fn protect_create_route<R: ?Sized>(&self, request: &R, resource: &str) -> Option<Denial>
    where
        S: SessionProvider<R>,
    {
        self.protect_route(request, CREATE, resource)
    }

    pub fn protect_update_route<R: ?Sized>(&self, request: &R, resource: &str) -> Option<Denial>
    where
        S: SessionProvider<R>,
    {
        self.protect_route(request, UPDATE, resource)
    }

    pub fn protect_delete_route<R: ?Sized>(&self, request: &R, resource: &str) -> Option<Denial>
    where
        S: SessionProvider<R>,
    {
        self.protect_route(request, DELETE, resource)
    }
}
