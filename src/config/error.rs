//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("No AI provider configured")]
    NoAiProviderConfigured,

    #[error("Summarization window sizes are inconsistent: retained size must be smaller than the window")]
    InvalidMemoryWindow,

    #[error("Summarization threshold must be at least 1")]
    InvalidSummarizeThreshold,

    #[error("Classifier confidence floor must be within [0, 1]")]
    InvalidConfidenceFloor,

    #[error("Sweep interval must be non-zero")]
    InvalidSweepInterval,
}
