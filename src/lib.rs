//! Crypto Intelligence API
//!
//! A thin chat backend for a crypto assistant:
//! - Runtime-swappable model registry (cloud Claude or local Ollama)
//! - Per-conversation memory with buffer / windowed / summarized retention
//! - Single-attempt chat dispatch returning structured results
//!
//! FLOW:
//! REQUEST → REGISTRY READ → MEMORY BIND → MODEL CALL → RECORD → RESPONSE

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod memory;
pub mod registry;
pub mod tools;

pub use error::{AgentError, Result};

// Re-export common types
pub use dispatch::{ChatDispatcher, ChatResult};
pub use registry::ModelRegistry;
