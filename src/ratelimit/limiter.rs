//! Per-client sliding-window rate limiter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::Method;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use super::window::ClientWindow;
use crate::clock::Clock;
use crate::config::RateLimitingConfig;
use crate::error::Result;
use crate::scope::RouteScope;

/// Resolved rate limiting settings.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    /// Maximum requests per client inside one window
    pub message_limit: usize,
    /// Length of the trailing window
    pub time_window: Duration,
    /// Requests the limiter applies to
    pub scope: RouteScope,
    /// Key clients by `X-Forwarded-For` when present
    pub trust_forwarded_for: bool,
}

impl RateLimitSettings {
    pub fn from_config(config: &RateLimitingConfig) -> Result<Self> {
        let scope = RouteScope::paths(config.path_prefixes.iter().cloned())
            .with_methods(config.methods.as_slice())?;

        Ok(Self {
            message_limit: config.message_limit as usize,
            time_window: Duration::from_secs(config.time_window_secs),
            scope,
            trust_forwarded_for: config.trust_forwarded_for,
        })
    }

    /// Body sent with a rejection.
    pub fn rejection_message(&self) -> String {
        let per = match self.time_window.as_secs() {
            1 => "second".to_string(),
            60 => "minute".to_string(),
            n => format!("{} seconds", n),
        };
        format!(
            "Message limit exceeded: max {} messages per {} allowed.",
            self.message_limit, per
        )
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The request was recorded and may proceed.
    Admitted {
        /// Requests the client has left in the current window
        remaining: usize,
    },
    /// The client is over its limit. Nothing was recorded.
    Rejected {
        /// Time until the oldest request leaves the window
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RateLimitDecision::Admitted { .. })
    }
}

/// Sliding-window limiter keyed by client address.
///
/// Each client's prune-check-record sequence runs under the map shard's
/// write lock, so concurrent requests from one client cannot lose updates.
pub struct SlidingWindowLimiter {
    /// Request logs indexed by client address
    clients: DashMap<String, ClientWindow>,
    settings: RateLimitSettings,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    /// Create an empty limiter.
    pub fn new(settings: RateLimitSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            clients: DashMap::new(),
            settings,
            clock,
        }
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    /// Whether requests with this method and path are limited at all.
    pub fn applies_to(&self, method: &Method, path: &str) -> bool {
        self.settings.scope.matches(method, path)
    }

    /// Check and record a request from `client` at `now`.
    pub fn check(&self, client: &str, now: Instant) -> RateLimitDecision {
        let limit = self.settings.message_limit;
        let window_len = self.settings.time_window;

        let mut window = self.clients.entry(client.to_string()).or_default();
        let pruned = window.prune(now, window_len);

        trace!(
            client = %client,
            pruned = pruned,
            in_window = window.len(),
            "Checking rate limit"
        );

        if window.len() >= limit {
            let retry_after = window.retry_after(now, window_len);
            debug!(
                client = %client,
                limit = limit,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            return RateLimitDecision::Rejected { retry_after };
        }

        window.record(now);
        RateLimitDecision::Admitted {
            remaining: limit - window.len(),
        }
    }

    /// Check and record a request from `client` using the limiter's clock.
    pub fn check_now(&self, client: &str) -> RateLimitDecision {
        self.check(client, self.clock.now())
    }

    /// Requests currently counted against `client`.
    pub fn request_count(&self, client: &str) -> usize {
        let now = self.clock.now();
        match self.clients.get_mut(client) {
            Some(mut window) => {
                window.prune(now, self.settings.time_window);
                window.len()
            }
            None => 0,
        }
    }

    /// Number of tracked client addresses.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Prune every client and evict those with nothing left in the window.
    ///
    /// Returns the number of evicted clients. An evicted client would have
    /// been pruned to empty on its next request anyway.
    pub fn sweep(&self, now: Instant) -> usize {
        let window_len = self.settings.time_window;
        let mut evicted = 0;

        self.clients.retain(|_, window| {
            window.prune(now, window_len);
            if window.is_empty() {
                evicted += 1;
                false
            } else {
                true
            }
        });

        evicted
    }

    /// Run [`sweep`](Self::sweep) every `interval` until the task is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let evicted = limiter.sweep(limiter.clock.now());
                if evicted > 0 {
                    debug!(
                        evicted = evicted,
                        remaining = limiter.client_count(),
                        "Evicted idle rate limit clients"
                    );
                }
            }
        })
    }

    /// Clear all clients.
    pub fn clear(&self) {
        self.clients.clear();
    }
}
