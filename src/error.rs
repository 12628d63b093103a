//! Error types for the crypto chat backend

use thiserror::Error;

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Core Errors
    // =============================

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Model invocation error: {0}")]
    ModelInvocation(String),

    #[error("Conversation not found: {0}")]
    NotFound(String),

    #[error("Unknown conversation policy: {0}")]
    UnknownPolicy(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
