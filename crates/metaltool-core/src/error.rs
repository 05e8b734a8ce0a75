//! Error types for MetalTool.

use thiserror::Error;

/// Main error type for MetalTool operations.
#[derive(Error, Debug)]
pub enum MetalToolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Shader compilation error: {0}")]
    Shader(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for MetalTool operations.
pub type Result<T> = std::result::Result<T, MetalToolError>;
