//! Request logging stage.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use parking_lot::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::identity::Principal;

/// Name logged for requests without a principal.
pub const ANONYMOUS: &str = "Anonymous";

/// Optional plain-text request log, one line per request.
#[derive(Debug, Default)]
pub struct RequestLog {
    file: Option<Arc<Mutex<File>>>,
}

impl RequestLog {
    /// Log through tracing only.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Append to `path` as well as tracing. The file is created if missing.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!(path = %path.display(), "Request log file opened");
        Ok(Self {
            file: Some(Arc::new(Mutex::new(file))),
        })
    }

    /// Write one `<timestamp> - User: <user> - Path: <path>` line.
    ///
    /// The write runs on the blocking pool. Failures are logged and
    /// swallowed.
    pub async fn append(&self, user: &str, path: &str) {
        let Some(file) = &self.file else {
            return;
        };
        let file = Arc::clone(file);

        let line = format!(
            "{} - User: {} - Path: {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f"),
            user,
            path
        );
        let written =
            tokio::task::spawn_blocking(move || file.lock().write_all(line.as_bytes())).await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to write request log"),
            Err(e) => warn!(error = %e, "Request log writer task failed"),
        }
    }
}

/// Log every request once the rest of the chain has answered it.
pub async fn log_requests(
    State(log): State<Arc<RequestLog>>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4();
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let user = request
        .extensions()
        .get::<Principal>()
        .map(|p| p.username.clone())
        .unwrap_or_else(|| ANONYMOUS.to_string());

    let response = next.run(request).await;

    info!(
        target: "chatguard::requests",
        request_id = %request_id,
        user = %user,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "Request handled"
    );
    log.append(&user, &path).await;

    response
}
