//! owl-gaia: GAIA benchmark runs with a role-playing agent society.
//!
//! A user agent instructs and a tool-using assistant agent solves each task.
//! The assistant's tools cover web browsing, search, documents, spreadsheets,
//! images, audio, video and code execution.

pub mod agents;
pub mod benchmark;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod society;
pub mod toolkits;
pub mod utils;

// Re-export commonly used error types
pub use error::{AgentError, BenchmarkError, ConfigError, LlmError, ModelError, ToolkitError};
