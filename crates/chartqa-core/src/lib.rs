//! chartqa Core - Configuration, shared types, and traits
//!
//! This crate defines the abstractions shared by the chartqa workspace:
//! - Common error types
//! - The `LlmClient` trait for completion backends
//! - The `AnswerService` trait for the free-form and tabular answer modes
//! - Configuration management
//!
//! Author: hephaex@gmail.com

pub mod config;

pub use config::{
    AgentConfig, AppConfig, ConfigError, LlmConfig, LlmProvider, LoggingConfig, ServerConfig,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for chartqa operations
#[derive(Error, Debug)]
pub enum ChartQaError {
    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Agent error: {0}")]
    AgentError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ChartQaError>;

// ============================================================================
// Answer Modes
// ============================================================================

/// Which answer backend served a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    /// Question forwarded verbatim to the completion endpoint
    FreeForm,
    /// Question answered by the tabular agent over the data file
    Tabular,
}

impl std::fmt::Display for AnswerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FreeForm => write!(f, "freeform"),
            Self::Tabular => write!(f, "tabular"),
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for LLM clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for a single prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Turns one question into one answer
///
/// Implementations must not keep per-question state between calls.
#[async_trait::async_trait]
pub trait AnswerService: Send + Sync {
    /// Answer a question
    async fn answer(&self, question: &str) -> Result<String>;

    /// The mode this service implements
    fn mode(&self) -> AnswerMode;
}

// ============================================================================
// Tests
// ============================================================================
