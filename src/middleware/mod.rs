//! The guard middleware chain.
//!
//! Stages run in this order, outermost first: identity, request logging,
//! access hours, role permission, message rate limiting. Disabled stages
//! are left out of the chain entirely.

mod access_hours;
mod rate_limit;
mod request_log;
mod role_permission;

pub use access_hours::{restrict_access_hours, AccessHours};
pub use rate_limit::{limit_messages, RateLimitState};
pub use request_log::{log_requests, RequestLog, ANONYMOUS};
pub use role_permission::{
    require_role, Denial, RolePermission, AUTHENTICATION_REQUIRED, PERMISSION_DENIED,
};

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::task::JoinHandle;
use tracing::info;

use crate::clock::Clock;
use crate::config::ChatGuardConfig;
use crate::error::Result;
use crate::identity::attach_principal;
use crate::ratelimit::{RateLimitSettings, SlidingWindowLimiter};

/// 403 with a plain-text body.
pub(crate) fn forbidden(body: &str) -> Response {
    (StatusCode::FORBIDDEN, body.to_string()).into_response()
}

/// The assembled middleware chain and its shared state.
///
/// Built once at server start. Dropping it (and every router it was
/// applied to) releases the rate limiter's client map.
pub struct ChatGuard {
    rate_limit: Option<RateLimitState>,
    access_hours: Option<Arc<AccessHours>>,
    role_permission: Option<Arc<RolePermission>>,
    request_log: Arc<RequestLog>,
    sweep_interval: Option<Duration>,
}

impl ChatGuard {
    /// Validate `config` and build every enabled stage.
    pub fn new(config: &ChatGuardConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let rl = &config.rate_limiting;
        let rate_limit = if rl.enabled {
            let settings = RateLimitSettings::from_config(rl)?;
            info!(
                message_limit = settings.message_limit,
                time_window_secs = settings.time_window.as_secs(),
                prefixes = ?settings.scope.prefixes(),
                "Message rate limiting enabled"
            );
            let limiter = SlidingWindowLimiter::new(settings, Arc::clone(&clock));
            Some(RateLimitState::new(Arc::new(limiter)))
        } else {
            None
        };

        let access_hours = if config.access_hours.enabled {
            info!(
                start = %config.access_hours.start,
                end = %config.access_hours.end,
                "Chat access hours enabled"
            );
            Some(Arc::new(AccessHours::from_config(
                &config.access_hours,
                Arc::clone(&clock),
            )?))
        } else {
            None
        };

        let role_permission = if config.role_permission.enabled {
            info!(
                allowed_roles = ?config.role_permission.allowed_roles,
                "Role permission checks enabled"
            );
            Some(Arc::new(RolePermission::from_config(&config.role_permission)))
        } else {
            None
        };

        let request_log = match &config.server.request_log_path {
            Some(path) => RequestLog::open(path)?,
            None => RequestLog::disabled(),
        };

        let sweep_interval = match rl.sweep_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            rate_limit,
            access_hours,
            role_permission,
            request_log: Arc::new(request_log),
            sweep_interval,
        })
    }

    /// The message rate limiter, if enabled.
    pub fn limiter(&self) -> Option<&Arc<SlidingWindowLimiter>> {
        self.rate_limit.as_ref().map(RateLimitState::limiter)
    }

    /// Wrap `router` with the enabled stages.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        // Layers added later run first.
        let mut router = router;
        if let Some(state) = &self.rate_limit {
            router = router.layer(from_fn_with_state(state.clone(), limit_messages));
        }
        if let Some(roles) = &self.role_permission {
            router = router.layer(from_fn_with_state(Arc::clone(roles), require_role));
        }
        if let Some(hours) = &self.access_hours {
            router = router.layer(from_fn_with_state(Arc::clone(hours), restrict_access_hours));
        }
        router
            .layer(from_fn_with_state(Arc::clone(&self.request_log), log_requests))
            .layer(from_fn(attach_principal))
    }

    /// Start periodic eviction of idle rate limit clients.
    ///
    /// Returns `None` when rate limiting or eviction is disabled.
    pub fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
        let limiter = self.limiter()?;
        let interval = self.sweep_interval?;
        info!(interval_secs = interval.as_secs(), "Starting idle client sweeper");
        Some(limiter.spawn_sweeper(interval))
    }
}
