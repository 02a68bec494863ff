//! Role checks for chat moderation routes.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use super::{forbidden, ANONYMOUS};
use crate::config::RolePermissionConfig;
use crate::identity::Principal;
use crate::scope::RouteScope;

pub const AUTHENTICATION_REQUIRED: &str = "Authentication required.";
pub const PERMISSION_DENIED: &str = "You do not have permission to access this resource.";

/// Why a principal was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Unauthenticated,
    RoleNotAllowed,
}

impl Denial {
    pub fn message(&self) -> &'static str {
        match self {
            Denial::Unauthenticated => AUTHENTICATION_REQUIRED,
            Denial::RoleNotAllowed => PERMISSION_DENIED,
        }
    }
}

/// Roles allowed on the protected routes.
#[derive(Debug, Clone)]
pub struct RolePermission {
    allowed_roles: HashSet<String>,
    scope: RouteScope,
}

impl RolePermission {
    pub fn from_config(config: &RolePermissionConfig) -> Self {
        Self {
            allowed_roles: config.allowed_roles.iter().cloned().collect(),
            scope: RouteScope::paths(config.path_prefixes.iter().cloned()),
        }
    }

    pub fn check(&self, principal: Option<&Principal>) -> Result<(), Denial> {
        let principal = principal.ok_or(Denial::Unauthenticated)?;
        match principal.role.as_deref() {
            Some(role) if self.allowed_roles.contains(role) => Ok(()),
            _ => Err(Denial::RoleNotAllowed),
        }
    }
}

/// Reject callers without an allowed role on protected routes.
pub async fn require_role(
    State(roles): State<Arc<RolePermission>>,
    request: Request,
    next: Next,
) -> Response {
    if roles.scope.matches(request.method(), request.uri().path()) {
        let principal = request.extensions().get::<Principal>();
        if let Err(denial) = roles.check(principal) {
            debug!(
                path = %request.uri().path(),
                user = principal.map(|p| p.username.as_str()).unwrap_or(ANONYMOUS),
                denial = ?denial,
                "Role permission denied"
            );
            return forbidden(denial.message());
        }
    }

    next.run(request).await
}
