//! Error types for stack composition and synthesis.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for IaC operations.
pub type IacResult<T> = Result<T, IacError>;

/// Errors that can occur while composing or synthesizing stacks.
#[derive(Error, Debug)]
pub enum IacError {
    #[error("Construct '{construct}' already exists in stack {stack} (logical id {logical_id})")]
    DuplicateConstruct {
        stack: String,
        construct: String,
        logical_id: String,
    },

    #[error("Stack already defined in app: {0}")]
    DuplicateStack(String),

    #[error("Unknown resource in stack {stack}: {logical_id}")]
    UnknownResource { stack: String, logical_id: String },

    #[error("Context lookup failed for {key}: {message}")]
    LookupFailed { key: String, message: String },

    #[error("Asset directory not found: {0}")]
    AssetNotFound(PathBuf),

    #[error("Asset staging failed: {0}")]
    Staging(#[from] fs_extra::error::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
