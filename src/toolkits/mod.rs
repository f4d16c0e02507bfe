//! Tool definitions, toolkits and the ordered tool set handed to agents.
//!
//! A [`Toolkit`] groups related [`Tool`]s and hands them out as trait
//! objects. A run concatenates the tools of several toolkits into one
//! [`ToolSet`], preserving toolkit order and the order within each toolkit.

pub mod audio;
pub mod code;
pub mod document;
pub mod excel;
pub mod image;
pub mod search;
pub mod video;
pub mod web;

pub use audio::AudioAnalysisToolkit;
pub use code::{CodeExecutionToolkit, Sandbox};
pub use document::DocumentProcessingToolkit;
pub use excel::ExcelToolkit;
pub use image::ImageAnalysisToolkit;
pub use search::SearchToolkit;
pub use video::VideoAnalysisToolkit;
pub use web::WebToolkit;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::error::ToolkitError;

/// Errors that can occur during tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Invalid parameters provided to the tool.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Tool execution failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Tool execution timed out.
    #[error("Execution timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Tool is not available in the current context.
    #[error("Tool not available: {0}")]
    NotAvailable(String),

    /// File system error.
    #[error("Filesystem error: {0}")]
    FilesystemError(String),

    /// Unsupported input format.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Model call made by the tool failed.
    #[error("Model error: {0}")]
    Model(#[from] crate::error::LlmError),
}

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool execution was successful.
    pub success: bool,
    /// Output from the tool execution.
    pub output: String,
    /// Error message if execution failed.
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful tool result.
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    /// Create a failed tool result.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Create a result with both output and error (partial success).
    pub fn partial(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            error: Some(error.into()),
        }
    }

    /// Text shown to the model as the observation for this result.
    pub fn observation(&self) -> String {
        match (&self.error, self.output.is_empty()) {
            (None, _) => self.output.clone(),
            (Some(err), true) => format!("Error: {}", err),
            (Some(err), false) => format!("{}\nError: {}", self.output, err),
        }
    }
}

/// Context for tool execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Scratch directory for downloads, extracted frames and generated code.
    pub working_dir: PathBuf,
    /// Default timeout for subprocesses and remote calls in seconds.
    pub default_timeout: u64,
}

impl ToolContext {
    /// Create a new execution context.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            default_timeout: 60,
        }
    }

    /// Set the default timeout.
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.default_timeout = timeout_seconds;
        self
    }
}

/// Trait for tools that can be executed by an agent.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique name of the tool.
    fn name(&self) -> &str;

    /// Returns a description of what the tool does.
    fn description(&self) -> &str;

    /// Returns the JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given JSON arguments.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError>;
}

/// A collaborator exposing a group of tools.
pub trait Toolkit: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// The toolkit's tools, in a stable order.
    fn tools(&self) -> Vec<Arc<dyn Tool>>;
}

/// Ordered sequence of tools handed to an agent.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolSet {
    /// Create an empty tool set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every tool of `toolkit`, returning how many were added.
    pub fn extend_from(&mut self, toolkit: &dyn Toolkit) -> usize {
        let tools = toolkit.tools();
        let added = tools.len();
        tracing::debug!(toolkit = toolkit.name(), tools = added, "Adding toolkit tools");
        self.tools.extend(tools);
        added
    }

    /// First tool with the given name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Tool names in order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Iterate over the tools in order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    /// Number of tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// JSON function definitions for every tool, in order.
    pub fn to_json_schema(&self) -> Value {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|tool| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters_schema()
                    }
                })
            })
            .collect();

        Value::Array(tools)
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Builds the HTTP client shared by a toolkit's tools.
pub(crate) fn http_client(toolkit: &str, timeout_secs: u64) -> Result<Client, ToolkitError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("owl-gaia/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ToolkitError::HttpClient {
            toolkit: toolkit.to_string(),
            reason: e.to_string(),
        })
}

/// Deserializes tool arguments into `T`.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args)
        .map_err(|e| ToolError::InvalidParameters(format!("Invalid parameters: {}", e)))
}

/// Rejects blank string arguments.
pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::InvalidParameters(format!(
            "{} cannot be empty",
            field
        )));
    }
    Ok(())
}
