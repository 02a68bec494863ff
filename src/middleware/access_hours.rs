//! Time-of-day access gate for chat routes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{NaiveTime, Timelike};
use tracing::debug;

use super::forbidden;
use crate::clock::Clock;
use crate::config::AccessHoursConfig;
use crate::error::{ChatGuardError, Result};
use crate::scope::RouteScope;

/// Daily window during which chat routes are open.
pub struct AccessHours {
    start: NaiveTime,
    end: NaiveTime,
    scope: RouteScope,
    clock: Arc<dyn Clock>,
    rejection: String,
}

impl AccessHours {
    pub fn from_config(config: &AccessHoursConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let start = parse_hhmm("access_hours.start", &config.start)?;
        let end = parse_hhmm("access_hours.end", &config.end)?;

        Ok(Self {
            start,
            end,
            scope: RouteScope::paths(config.path_prefixes.iter().cloned()),
            clock,
            rejection: format!(
                "Access to the chat is restricted to {}-{} only.",
                display_hour(start),
                display_hour(end)
            ),
        })
    }

    /// Whether `now` falls inside the window. Both ends are inclusive; a
    /// window whose start is after its end wraps past midnight.
    pub fn allows(&self, now: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= now && now <= self.end
        } else {
            now >= self.start || now <= self.end
        }
    }

    pub fn rejection_message(&self) -> &str {
        &self.rejection
    }
}

fn parse_hhmm(field: &str, value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| {
        ChatGuardError::Config(format!("{}: expected HH:MM, got {:?} ({})", field, value, e))
    })
}

fn display_hour(time: NaiveTime) -> String {
    if time.minute() == 0 {
        time.format("%-I%p").to_string()
    } else {
        time.format("%-I:%M%p").to_string()
    }
}

/// Reject chat requests outside the configured hours.
pub async fn restrict_access_hours(
    State(hours): State<Arc<AccessHours>>,
    request: Request,
    next: Next,
) -> Response {
    if hours.scope.matches(request.method(), request.uri().path()) {
        let now = hours.clock.time_of_day();
        if !hours.allows(now) {
            debug!(
                path = %request.uri().path(),
                time = %now.format("%H:%M:%S"),
                "Chat access outside allowed hours"
            );
            return forbidden(hours.rejection_message());
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::middleware::test_support::{request, send};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn create_hours(start: &str, end: &str) -> (AccessHours, Arc<ManualClock>) {
        let config = AccessHoursConfig {
            start: start.to_string(),
            end: end.to_string(),
            ..AccessHoursConfig::default()
        };
        let clock = Arc::new(ManualClock::new(hm(12, 0)));
        (AccessHours::from_config(&config, clock.clone()).unwrap(), clock)
    }

    #[test]
    fn test_default_window_boundaries() {
        let (hours, _) = create_hours("18:00", "21:00");

        assert!(hours.allows(hm(18, 0)));
        assert!(hours.allows(hm(19, 30)));
        assert!(hours.allows(hm(21, 0)));
        assert!(!hours.allows(hm(17, 59)));
        assert!(!hours.allows(hm(21, 1)));
    }

    #[test]
    fn test_overnight_window() {
        let (hours, _) = create_hours("22:00", "02:00");

        assert!(hours.allows(hm(23, 0)));
        assert!(hours.allows(hm(0, 30)));
        assert!(hours.allows(hm(2, 0)));
        assert!(!hours.allows(hm(12, 0)));
    }

    #[test]
    fn test_rejection_message() {
        let (hours, _) = create_hours("18:00", "21:00");
        assert_eq!(
            hours.rejection_message(),
            "Access to the chat is restricted to 6PM-9PM only."
        );

        let (hours, _) = create_hours("08:30", "12:00");
        assert_eq!(
            hours.rejection_message(),
            "Access to the chat is restricted to 8:30AM-12PM only."
        );
    }

    #[test]
    fn test_invalid_time_rejected() {
        let config = AccessHoursConfig {
            start: "6pm".to_string(),
            ..AccessHoursConfig::default()
        };
        let result = AccessHours::from_config(&config, Arc::new(ManualClock::default()));
        assert!(matches!(result, Err(ChatGuardError::Config(_))));
    }

    #[tokio::test]
    async fn test_gate_over_http() {
        let (hours, clock) = create_hours("18:00", "21:00");
        let router = Router::new()
            .route("/api/chats/", get(|| async { "chats" }))
            .route("/health", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                Arc::new(hours),
                restrict_access_hours,
            ));

        let (status, body) = send(&router, request("GET", "/api/chats/", None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, "Access to the chat is restricted to 6PM-9PM only.");

        let (status, _) = send(&router, request("GET", "/health", None)).await;
        assert_eq!(status, StatusCode::OK);

        clock.set_time_of_day(hm(20, 15));
        let (status, body) = send(&router, request("GET", "/api/chats/", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "chats");
    }
}
