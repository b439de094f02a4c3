//! Error types for settings loading.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Settings file not found: {0}")]
    NotFound(PathBuf),

    #[error("Environment not found in settings: {0}")]
    EnvironmentNotFound(String),

    #[error("Invalid settings for environment '{environment}': {message}")]
    InvalidEnvironment { environment: String, message: String },

    #[error("Invalid settings document: {0}")]
    InvalidDocument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
