//! Error types shared across the workspace

use thiserror::Error;

/// Errors raised by the core types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid name component: {0}")]
    InvalidComponent(String),

    #[error("Unknown node: {0}")]
    UnknownNode(u32),

    #[error("Unknown face: {0}")]
    UnknownFace(u64),
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
