//! Code execution toolkit.
//!
//! Runs Python or shell snippets in a local subprocess rooted at the scratch
//! directory. Output is captured, truncated and returned to the agent;
//! a non-zero exit is reported as a partial result so the agent sees both
//! the output and the failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use super::{parse_args, require_non_empty, Tool, ToolContext, ToolError, ToolResult, Toolkit};

/// Maximum output length to prevent memory issues.
const MAX_OUTPUT_LENGTH: usize = 100_000;

/// Default timeout for code execution in seconds.
const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

/// Where code runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sandbox {
    /// A child process of the runner, sharing its filesystem.
    Subprocess,
}

impl std::str::FromStr for Sandbox {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "subprocess" => Ok(Sandbox::Subprocess),
            other => Err(format!("Unknown sandbox: {}", other)),
        }
    }
}

/// Languages the executor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Language {
    Python,
    Bash,
}

impl Language {
    fn parse(raw: &str) -> Result<Self, ToolError> {
        match raw.trim().to_lowercase().as_str() {
            "python" | "python3" | "py" => Ok(Language::Python),
            "bash" | "sh" | "shell" => Ok(Language::Bash),
            other => Err(ToolError::InvalidParameters(format!(
                "Unsupported language '{}': use python or bash",
                other
            ))),
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            Language::Python => ".py",
            Language::Bash => ".sh",
        }
    }

    fn interpreter(&self) -> &'static str {
        match self {
            Language::Python => "python3",
            Language::Bash => "bash",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExecuteCodeParams {
    code: String,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

fn default_language() -> String {
    "python".to_string()
}

/// Toolkit exposing `execute_code`.
pub struct CodeExecutionToolkit {
    sandbox: Sandbox,
    verbose: bool,
    timeout_seconds: u64,
}

impl CodeExecutionToolkit {
    pub fn new(sandbox: Sandbox, verbose: bool) -> Self {
        Self {
            sandbox,
            verbose,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    /// Override the default execution timeout.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn sandbox(&self) -> Sandbox {
        self.sandbox
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

impl Toolkit for CodeExecutionToolkit {
    fn name(&self) -> &str {
        "code_execution"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(ExecuteCodeTool {
            verbose: self.verbose,
            timeout_seconds: self.timeout_seconds,
        })]
    }
}

struct ExecuteCodeTool {
    verbose: bool,
    timeout_seconds: u64,
}

impl ExecuteCodeTool {
    async fn run(
        &self,
        language: Language,
        code: &str,
        ctx: &ToolContext,
        timeout_seconds: u64,
    ) -> Result<ToolResult, ToolError> {
        tokio::fs::create_dir_all(&ctx.working_dir)
            .await
            .map_err(|e| ToolError::FilesystemError(e.to_string()))?;

        let script = tempfile::Builder::new()
            .prefix("exec_")
            .suffix(language.suffix())
            .tempfile_in(&ctx.working_dir)
            .map_err(|e| ToolError::FilesystemError(format!("Failed to create script: {}", e)))?;
        tokio::fs::write(script.path(), code)
            .await
            .map_err(|e| ToolError::FilesystemError(format!("Failed to write script: {}", e)))?;

        let mut cmd = Command::new(language.interpreter());
        cmd.arg(script.path())
            .current_dir(&ctx.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if self.verbose {
            info!(language = language.interpreter(), "Executing code:\n{}", code);
        }

        let child = cmd.spawn().map_err(|e| {
            ToolError::NotAvailable(format!(
                "Failed to spawn {}: {}",
                language.interpreter(),
                e
            ))
        })?;

        let output = tokio::time::timeout(
            Duration::from_secs(timeout_seconds),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| ToolError::Timeout {
            seconds: timeout_seconds,
        })?
        .map_err(|e| ToolError::ExecutionFailed(format!("Process error: {}", e)))?;

        let exit_code = output.status.code().unwrap_or(-1);
        let mut text = clip(String::from_utf8_lossy(&output.stdout).into_owned());
        let stderr = clip(String::from_utf8_lossy(&output.stderr).into_owned());
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push_str("\n--- stderr ---\n");
            }
            text.push_str(&stderr);
        }

        if self.verbose {
            info!(exit_code, "Execution output:\n{}", text);
        } else {
            debug!(exit_code, bytes = text.len(), "Code execution finished");
        }

        if exit_code == 0 {
            Ok(ToolResult::success(text))
        } else {
            Ok(ToolResult::partial(
                text,
                format!("Process exited with code {}", exit_code),
            ))
        }
    }
}

fn clip(mut s: String) -> String {
    if s.len() > MAX_OUTPUT_LENGTH {
        let mut cut = MAX_OUTPUT_LENGTH;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("\n...[output truncated]");
    }
    s
}

#[async_trait]
impl Tool for ExecuteCodeTool {
    fn name(&self) -> &str {
        "execute_code"
    }

    fn description(&self) -> &str {
        "Execute a Python or bash snippet in a subprocess and return its stdout and stderr. Print anything you want to see."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Source code to execute"
                },
                "language": {
                    "type": "string",
                    "enum": ["python", "bash"],
                    "default": "python"
                },
                "timeout_seconds": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 600
                }
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let params: ExecuteCodeParams = parse_args(args)?;
        require_non_empty("code", &params.code)?;
        let language = Language::parse(&params.language)?;
        let timeout_seconds = params
            .timeout_seconds
            .unwrap_or_else(|| self.timeout_seconds.max(ctx.default_timeout));

        self.run(language, &params.code, ctx, timeout_seconds).await
    }
}
