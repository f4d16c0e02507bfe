//! Error types for owl-gaia operations.
//!
//! Defines error types for the major subsystems:
//! - Run configuration and environment loading
//! - LLM API interactions
//! - Model handle construction
//! - Toolkit construction
//! - Agent conversation steps
//! - Benchmark dataset loading, running and result persistence

use thiserror::Error;

/// Errors that can occur while loading run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// IO error while preparing the run environment.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Scripted provider has no response left for request {0}")]
    ScriptExhausted(usize),
}

/// Errors that can occur while constructing a model handle.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Missing credential for platform '{platform}': set {env_var}")]
    MissingCredential { platform: String, env_var: String },

    #[error("Invalid model endpoint url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Platform '{0}' requires an endpoint url")]
    MissingUrl(String),

    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("LLM client error: {0}")]
    Client(#[from] LlmError),
}

/// Errors that can occur while constructing a toolkit.
#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error("Toolkit '{toolkit}' requires {env_var} to be set")]
    MissingCredential { toolkit: String, env_var: String },

    #[error("Failed to build HTTP client for toolkit '{toolkit}': {reason}")]
    HttpClient { toolkit: String, reason: String },
}

/// Errors that can occur while an agent is stepping a conversation.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Empty response from model '{0}'")]
    EmptyResponse(String),
}

/// Errors that can occur while loading or running the benchmark.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error("Dataset not found at '{0}'")]
    DatasetNotFound(String),

    #[error("Failed to parse dataset line {line} in '{path}': {message}")]
    DatasetParse {
        path: String,
        line: usize,
        message: String,
    },

    #[error("Invalid subset '{0}': expected 'valid' or 'test'")]
    InvalidSubset(String),

    #[error("Invalid level {0}: expected 1, 2 or 3")]
    InvalidLevel(u8),

    #[error("Index {index} out of range for {len} selected tasks")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
