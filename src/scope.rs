//! Route matching shared by the middleware stages.

use axum::http::Method;

use crate::error::{ChatGuardError, Result};

/// The set of requests a middleware stage applies to.
///
/// A request is in scope when its path starts with one of the prefixes and,
/// if a method filter is set, its method is one of the listed methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteScope {
    prefixes: Vec<String>,
    methods: Option<Vec<Method>>,
}

impl RouteScope {
    /// Scope covering every method on the given path prefixes.
    pub fn paths<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            methods: None,
        }
    }

    /// Restrict the scope to the given method names.
    pub fn with_methods<S: AsRef<str>>(mut self, methods: &[S]) -> Result<Self> {
        let parsed = methods
            .iter()
            .map(|m| {
                let name = m.as_ref().trim().to_ascii_uppercase();
                Method::from_bytes(name.as_bytes()).map_err(|_| {
                    ChatGuardError::Config(format!("invalid HTTP method: {:?}", m.as_ref()))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.methods = Some(parsed);
        Ok(self)
    }

    /// Whether a request with this method and path is in scope.
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        let method_ok = match &self.methods {
            Some(methods) => methods.contains(method),
            None => true,
        };
        method_ok && self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}
