//! Configuration management for Chatguard.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{ChatGuardError, Result};

/// Prefix for environment variable overrides, e.g.
/// `CHATGUARD__RATE_LIMITING__MESSAGE_LIMIT=10`.
pub const ENV_PREFIX: &str = "CHATGUARD";

/// Upper bound for `time_window_secs` and `sweep_interval_secs` (one year).
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

/// Main configuration for the Chatguard service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatGuardConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Per-client message rate limiting
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Time-of-day access restriction
    #[serde(default)]
    pub access_hours: AccessHoursConfig,

    /// Role checks for moderation routes
    #[serde(default)]
    pub role_permission: RolePermissionConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Append a plain-text request log here in addition to tracing output
    #[serde(default)]
    pub request_log_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            request_log_path: None,
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum requests per client inside one window
    #[serde(default = "default_message_limit")]
    pub message_limit: u32,

    /// Length of the trailing window in seconds
    #[serde(default = "default_time_window")]
    pub time_window_secs: u64,

    /// HTTP methods that count as writes
    #[serde(default = "default_write_methods")]
    pub methods: Vec<String>,

    /// Only paths starting with one of these are limited
    #[serde(default = "default_chat_prefixes")]
    pub path_prefixes: Vec<String>,

    /// Key clients by the first `X-Forwarded-For` value when present
    #[serde(default = "default_true")]
    pub trust_forwarded_for: bool,

    /// How often idle clients are evicted. Zero disables eviction.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            message_limit: default_message_limit(),
            time_window_secs: default_time_window(),
            methods: default_write_methods(),
            path_prefixes: default_chat_prefixes(),
            trust_forwarded_for: true,
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_message_limit() -> u32 {
    5
}

fn default_time_window() -> u64 {
    60
}

fn default_write_methods() -> Vec<String> {
    vec!["POST".to_string()]
}

fn default_chat_prefixes() -> Vec<String> {
    vec!["/api/chats/".to_string(), "/chats/".to_string()]
}

fn default_sweep_interval() -> u64 {
    60
}

/// Access hours configuration. Times are local `HH:MM`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessHoursConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_access_start")]
    pub start: String,

    #[serde(default = "default_access_end")]
    pub end: String,

    #[serde(default = "default_chat_prefixes")]
    pub path_prefixes: Vec<String>,
}

impl Default for AccessHoursConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start: default_access_start(),
            end: default_access_end(),
            path_prefixes: default_chat_prefixes(),
        }
    }
}

fn default_access_start() -> String {
    "18:00".to_string()
}

fn default_access_end() -> String {
    "21:00".to_string()
}

/// Role permission configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePermissionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_allowed_roles")]
    pub allowed_roles: Vec<String>,

    #[serde(default = "default_admin_prefixes")]
    pub path_prefixes: Vec<String>,
}

impl Default for RolePermissionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_roles: default_allowed_roles(),
            path_prefixes: default_admin_prefixes(),
        }
    }
}

fn default_allowed_roles() -> Vec<String> {
    vec!["admin".to_string(), "moderator".to_string()]
}

fn default_admin_prefixes() -> Vec<String> {
    vec!["/api/chats/admin/".to_string(), "/chats/admin/".to_string()]
}

impl ChatGuardConfig {
    /// Load configuration from an optional YAML file layered under
    /// `CHATGUARD__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }

        let config: ChatGuardConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ChatGuardConfig = serde_yaml::from_str(yaml)
            .map_err(|e| ChatGuardError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values serde cannot.
    pub fn validate(&self) -> Result<()> {
        let rl = &self.rate_limiting;
        if rl.message_limit == 0 {
            return Err(ChatGuardError::Config(
                "rate_limiting.message_limit must be at least 1".to_string(),
            ));
        }
        if rl.time_window_secs == 0 {
            return Err(ChatGuardError::Config(
                "rate_limiting.time_window_secs must be at least 1".to_string(),
            ));
        }
        if rl.time_window_secs > MAX_WINDOW_SECS {
            return Err(ChatGuardError::Config(format!(
                "rate_limiting.time_window_secs must be at most {}",
                MAX_WINDOW_SECS
            )));
        }
        if rl.sweep_interval_secs > MAX_WINDOW_SECS {
            return Err(ChatGuardError::Config(format!(
                "rate_limiting.sweep_interval_secs must be at most {}",
                MAX_WINDOW_SECS
            )));
        }
        if rl.methods.is_empty() {
            return Err(ChatGuardError::Config(
                "rate_limiting.methods must not be empty".to_string(),
            ));
        }

        check_prefixes("rate_limiting.path_prefixes", &rl.path_prefixes)?;
        check_prefixes("access_hours.path_prefixes", &self.access_hours.path_prefixes)?;
        check_prefixes(
            "role_permission.path_prefixes",
            &self.role_permission.path_prefixes,
        )?;

        Ok(())
    }
}

fn check_prefixes(field: &str, prefixes: &[String]) -> Result<()> {
    match prefixes.iter().find(|p| !p.starts_with('/')) {
        Some(bad) => Err(ChatGuardError::Config(format!(
            "{}: prefix {:?} must start with '/'",
            field, bad
        ))),
        None => Ok(()),
    }
}
