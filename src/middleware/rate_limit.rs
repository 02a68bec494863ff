//! Message rate limiting stage.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::trace;

use super::forbidden;
use crate::client::client_address;
use crate::ratelimit::{RateLimitDecision, SlidingWindowLimiter};

/// State for [`limit_messages`].
#[derive(Clone)]
pub struct RateLimitState {
    limiter: Arc<SlidingWindowLimiter>,
    rejection: Arc<str>,
}

impl RateLimitState {
    pub fn new(limiter: Arc<SlidingWindowLimiter>) -> Self {
        let rejection = limiter.settings().rejection_message().into();
        Self { limiter, rejection }
    }

    pub fn limiter(&self) -> &Arc<SlidingWindowLimiter> {
        &self.limiter
    }
}

/// Reject write requests from clients that are over their message limit.
///
/// Requests outside the limiter's scope pass through untouched.
pub async fn limit_messages(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    if !state
        .limiter
        .applies_to(request.method(), request.uri().path())
    {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_address(
        request.headers(),
        peer,
        state.limiter.settings().trust_forwarded_for,
    );

    match state.limiter.check_now(&client) {
        RateLimitDecision::Admitted { remaining } => {
            trace!(client = %client, remaining = remaining, "Message admitted");
            next.run(request).await
        }
        // the limiter already logs the rejection
        RateLimitDecision::Rejected { .. } => forbidden(state.rejection.as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::RateLimitingConfig;
    use crate::middleware::test_support::{request, send};
    use crate::ratelimit::RateLimitSettings;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use std::time::Duration;

    fn create_router(limit: u32, trust_forwarded_for: bool) -> (Router, Arc<ManualClock>) {
        let config = RateLimitingConfig {
            message_limit: limit,
            trust_forwarded_for,
            ..RateLimitingConfig::default()
        };
        let clock = Arc::new(ManualClock::default());
        let limiter = SlidingWindowLimiter::new(
            RateLimitSettings::from_config(&config).unwrap(),
            clock.clone(),
        );
        let state = RateLimitState::new(Arc::new(limiter));

        let router = Router::new()
            .route("/chats/", post(|| async { "sent" }).get(|| async { "list" }))
            .route("/users/", post(|| async { "created" }))
            .layer(axum::middleware::from_fn_with_state(state, limit_messages));
        (router, clock)
    }

    #[tokio::test]
    async fn test_chat_scenario_over_http() {
        let (router, clock) = create_router(5, true);

        for t in 0..5 {
            clock.set_elapsed(Duration::from_secs(t));
            let (status, body) = send(&router, request("POST", "/chats/", Some("1.2.3.4"))).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, "sent");
        }

        clock.set_elapsed(Duration::from_secs(5));
        let (status, body) = send(&router, request("POST", "/chats/", Some("1.2.3.4"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, "Message limit exceeded: max 5 messages per minute allowed.");

        clock.set_elapsed(Duration::from_secs(61));
        let (status, _) = send(&router, request("POST", "/chats/", Some("1.2.3.4"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_reads_and_other_paths_bypass() {
        let (router, _) = create_router(1, true);

        for _ in 0..10 {
            let (status, _) = send(&router, request("GET", "/chats/", Some("1.2.3.4"))).await;
            assert_eq!(status, StatusCode::OK);
            let (status, _) = send(&router, request("POST", "/users/", Some("1.2.3.4"))).await;
            assert_eq!(status, StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_clients_limited_independently() {
        let (router, _) = create_router(1, true);

        let (status, _) = send(&router, request("POST", "/chats/", Some("1.1.1.1"))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&router, request("POST", "/chats/", Some("1.1.1.1"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&router, request("POST", "/chats/", Some("2.2.2.2"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_untrusted_header_shares_peer_bucket() {
        let (router, _) = create_router(1, false);

        let (status, _) = send(&router, request("POST", "/chats/", Some("1.1.1.1"))).await;
        assert_eq!(status, StatusCode::OK);
        // no peer info in-process, so both land on the same fallback key
        let (status, _) = send(&router, request("POST", "/chats/", Some("2.2.2.2"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_rejection_logged_once_below_warn() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (router, _) = create_router(1, true);
        let (status, _) = send(&router, request("POST", "/chats/", Some("1.2.3.4"))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&router, request("POST", "/chats/", Some("1.2.3.4"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let output = String::from_utf8(captured.0.lock().clone()).unwrap();
        assert_eq!(output.matches("Rate limit exceeded").count(), 1);
        assert!(!output.contains("WARN"));
    }
}
