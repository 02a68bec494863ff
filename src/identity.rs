//! Caller identity carried through the middleware chain.

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

/// Header naming the authenticated user.
pub const USER_HEADER: &str = "x-user";
/// Header carrying the user's role.
pub const ROLE_HEADER: &str = "x-user-role";

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub role: Option<String>,
}

impl Principal {
    pub fn new(username: impl Into<String>, role: Option<String>) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    /// Read a principal from identity headers set by an upstream
    /// authenticating proxy. A missing or blank user means anonymous.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let username = header(USER_HEADER)?;
        Some(Self::new(username, header(ROLE_HEADER)))
    }
}

/// Attach the caller's [`Principal`] to the request extensions, if any.
pub async fn attach_principal(mut request: Request, next: Next) -> Response {
    if let Some(principal) = Principal::from_headers(request.headers()) {
        request.extensions_mut().insert(principal);
    }
    next.run(request).await
}
