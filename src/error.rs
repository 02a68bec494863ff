//! Error types for the Chatguard service.

use thiserror::Error;

/// Main error type for Chatguard operations.
#[derive(Error, Debug)]
pub enum ChatGuardError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ChatGuardError {
    fn from(err: config::ConfigError) -> Self {
        ChatGuardError::Config(err.to_string())
    }
}

/// Result type alias for Chatguard operations.
pub type Result<T> = std::result::Result<T, ChatGuardError>;
