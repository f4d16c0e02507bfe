//! Conversational agent with JSON tool calling.
//!
//! Each [`ChatAgent::step`] appends the input to the agent's history, asks
//! the model for a reply and, while the reply contains a tool call, runs the
//! tool and feeds the observation back. The step ends on the first reply
//! without a tool call or when the per-step tool budget is spent.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::params::AgentParams;
use super::parser::{JsonToolCallParser, ToolCall, ToolCallParser};
use super::prompts::{build_tool_prompt, unknown_tool_observation, TOOL_LIMIT_PROMPT};
use crate::config::DEFAULT_CACHE_DIR;
use crate::error::AgentError;
use crate::llm::{Message, Usage};
use crate::toolkits::{ToolContext, ToolError, ToolResult};
use crate::utils::truncate_chars;

/// Default number of tool calls allowed per step.
pub const DEFAULT_MAX_TOOL_CALLS: usize = 10;

/// Observation characters kept in the conversation.
const MAX_OBSERVATION_CHARS: usize = 20_000;

/// One executed tool call and what it returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub call: ToolCall,
    /// Whether the tool reported success.
    pub success: bool,
    /// Observation text sent back to the model.
    pub observation: String,
}

/// Result of a single agent step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Final reply text of the step.
    pub content: String,
    /// Tool calls made during the step, in order.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Tokens spent during the step.
    pub usage: Usage,
}

/// A role-bound chat agent.
pub struct ChatAgent {
    role_name: String,
    params: AgentParams,
    parser: Box<dyn ToolCallParser>,
    ctx: ToolContext,
    max_tool_calls: usize,
    history: Vec<Message>,
    total_usage: Usage,
}

impl ChatAgent {
    /// Create an agent whose history starts with `system_message`.
    ///
    /// When `params` carries tools, their definitions and the calling
    /// convention are appended to the system message.
    pub fn new(role_name: impl Into<String>, system_message: impl Into<String>, params: AgentParams) -> Self {
        let mut system = system_message.into();
        if let Some(tools) = params.tools.as_ref().filter(|t| !t.is_empty()) {
            system.push_str("\n\n");
            system.push_str(&build_tool_prompt(&tools.to_json_schema()));
        }

        Self {
            role_name: role_name.into(),
            params,
            parser: Box::new(JsonToolCallParser),
            ctx: ToolContext::new(DEFAULT_CACHE_DIR),
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
            history: vec![Message::system(system)],
            total_usage: Usage::default(),
        }
    }

    /// Set the context tools run in.
    pub fn with_context(mut self, ctx: ToolContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Set the per-step tool call budget.
    pub fn with_max_tool_calls(mut self, max_tool_calls: usize) -> Self {
        self.max_tool_calls = max_tool_calls;
        self
    }

    pub fn role_name(&self) -> &str {
        &self.role_name
    }

    pub fn params(&self) -> &AgentParams {
        &self.params
    }

    /// Conversation so far, starting with the system message.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Tokens spent over the agent's lifetime.
    pub fn total_usage(&self) -> Usage {
        self.total_usage
    }

    /// Drop everything but the system message.
    pub fn reset(&mut self) {
        self.history.truncate(1);
        self.total_usage = Usage::default();
    }

    async fn generate(&mut self, usage: &mut Usage) -> Result<String, AgentError> {
        let response = self.params.model.complete(self.history.clone()).await?;
        usage.accumulate(&response.usage);
        self.total_usage.accumulate(&response.usage);

        let text = response
            .first_content()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AgentError::EmptyResponse(self.params.model.model_type().to_string()))?;
        self.history.push(Message::assistant(text.clone()));
        Ok(text)
    }

    /// Runs one call. Tool failures become observations; a failed model
    /// call inside the tool ends the step.
    async fn run_tool(&self, call: &ToolCall) -> Result<ToolCallRecord, AgentError> {
        let Some(tools) = self.params.tools.as_ref() else {
            return Ok(ToolCallRecord {
                call: call.clone(),
                success: false,
                observation: unknown_tool_observation(&call.name, &[]),
            });
        };
        let Some(tool) = tools.get(&call.name) else {
            warn!(role = %self.role_name, tool = %call.name, "Model called an unknown tool");
            return Ok(ToolCallRecord {
                call: call.clone(),
                success: false,
                observation: unknown_tool_observation(&call.name, &tools.names()),
            });
        };

        info!(role = %self.role_name, tool = %call.name, "Calling tool");
        let result = match tool.execute(call.arguments.clone(), &self.ctx).await {
            Ok(result) => result,
            Err(ToolError::Model(e)) => {
                warn!(role = %self.role_name, tool = %call.name, error = %e, "Model call inside tool failed");
                return Err(AgentError::Llm(e));
            }
            Err(e) => ToolResult::failure(e.to_string()),
        };
        debug!(tool = %call.name, success = result.success, "Tool finished");

        let observation = if result.success {
            format!("Tool '{}' succeeded:\n{}", call.name, result.output)
        } else {
            format!("Tool '{}' failed:\n{}", call.name, result.observation())
        };
        Ok(ToolCallRecord {
            call: call.clone(),
            success: result.success,
            observation: truncate_chars(&observation, MAX_OBSERVATION_CHARS),
        })
    }

    /// Send `input` and run the tool loop until a plain reply arrives.
    pub async fn step(&mut self, input: &str) -> Result<AgentResponse, AgentError> {
        self.history.push(Message::user(input));
        let mut usage = Usage::default();
        let mut tool_calls = Vec::new();

        let mut content = self.generate(&mut usage).await?;
        loop {
            let call = if self.params.tools.is_some() {
                self.parser.parse(&content)
            } else {
                None
            };
            let Some(call) = call else {
                break;
            };

            if tool_calls.len() >= self.max_tool_calls {
                warn!(
                    role = %self.role_name,
                    limit = self.max_tool_calls,
                    "Tool call budget exhausted"
                );
                self.history.push(Message::user(TOOL_LIMIT_PROMPT));
                content = self.generate(&mut usage).await?;
                break;
            }

            let record = self.run_tool(&call).await?;
            self.history.push(Message::user(record.observation.clone()));
            tool_calls.push(record);
            content = self.generate(&mut usage).await?;
        }

        Ok(AgentResponse {
            content,
            tool_calls,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkits::testing::scripted_model;
    use crate::toolkits::{CodeExecutionToolkit, Sandbox, ToolSet};

    fn bash_tools() -> ToolSet {
        let mut tools = ToolSet::new();
        tools.extend_from(&CodeExecutionToolkit::new(Sandbox::Subprocess, false));
        tools
    }

    #[tokio::test]
    async fn test_plain_reply_without_tools() {
        let (model, provider) = scripted_model(["Hello there."]);
        let mut agent = ChatAgent::new("user", "You instruct.", AgentParams::user(model));

        let response = agent.step("Start").await.expect("step");
        assert_eq!(response.content, "Hello there.");
        assert!(response.tool_calls.is_empty());
        assert_eq!(agent.history().len(), 3);

        let request = &provider.requests()[0];
        assert_eq!(request.messages[0].text(), "You instruct.");
        assert_eq!(request.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_user_agent_ignores_json_in_reply() {
        let (model, _) = scripted_model([r#"{"tool": "execute_code", "arguments": {"code": "1"}}"#]);
        let mut agent = ChatAgent::new("user", "sys", AgentParams::user(model));
        let response = agent.step("go").await.expect("step");
        assert!(response.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_tool_loop_executes_and_feeds_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (model, provider) = scripted_model([
            r#"{"tool": "execute_code", "arguments": {"code": "echo 41", "language": "bash"}}"#,
            "The output was 41.",
        ]);
        let mut agent = ChatAgent::new("assistant", "You solve.", AgentParams::assistant(model, bash_tools()))
            .with_context(ToolContext::new(dir.path()));

        let response = agent.step("Compute").await.expect("step");
        assert_eq!(response.content, "The output was 41.");
        assert_eq!(response.tool_calls.len(), 1);
        assert!(response.tool_calls[0].success);
        assert!(response.tool_calls[0].observation.contains("41"));
        assert_eq!(response.usage.prompt_tokens, 2);

        let requests = provider.requests();
        assert!(requests[0].messages[0].text().contains("### execute_code"));
        let feedback = requests[1].messages.last().map(|m| m.text()).unwrap_or_default();
        assert!(feedback.starts_with("Tool 'execute_code' succeeded:"));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_observation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (model, provider) = scripted_model([
            r#"{"tool": "teleport", "arguments": {}}"#,
            "Fine, no teleporting.",
        ]);
        let mut agent = ChatAgent::new("assistant", "sys", AgentParams::assistant(model, bash_tools()))
            .with_context(ToolContext::new(dir.path()));

        let response = agent.step("go").await.expect("step");
        assert_eq!(response.content, "Fine, no teleporting.");
        assert!(!response.tool_calls[0].success);
        let feedback = provider.requests()[1].messages.last().map(|m| m.text()).unwrap_or_default();
        assert_eq!(feedback, "Tool 'teleport' is not available. Available tools: execute_code");
    }

    #[tokio::test]
    async fn test_tool_budget_stops_loop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let call = r#"{"tool": "execute_code", "arguments": {"code": "true", "language": "bash"}}"#;
        let (model, provider) = scripted_model([call, call, call, "Stopping here."]);
        let mut agent = ChatAgent::new("assistant", "sys", AgentParams::assistant(model, bash_tools()))
            .with_context(ToolContext::new(dir.path()))
            .with_max_tool_calls(2);

        let response = agent.step("loop").await.expect("step");
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.content, "Stopping here.");
        assert_eq!(provider.request_count(), 4);
        let last = provider.requests()[3].messages.last().map(|m| m.text()).unwrap_or_default();
        assert_eq!(last, TOOL_LIMIT_PROMPT);
    }

    #[tokio::test]
    async fn test_empty_reply_is_error() {
        let (model, _) = scripted_model(["   "]);
        let mut agent = ChatAgent::new("user", "sys", AgentParams::user(model));
        assert!(matches!(agent.step("x").await, Err(AgentError::EmptyResponse(_))));
    }

    #[tokio::test]
    async fn test_reset_keeps_system_message() {
        let (model, _) = scripted_model(["a"]);
        let mut agent = ChatAgent::new("user", "sys", AgentParams::user(model));
        agent.step("x").await.expect("step");
        assert!(agent.total_usage().total_tokens > 0);
        agent.reset();
        assert_eq!(agent.history().len(), 1);
        assert_eq!(agent.total_usage(), Usage::default());
    }

    /// Tool whose execution fails the way a tool-internal model call or a
    /// bad input would.
    struct FlakyTool {
        model_down: bool,
    }

    #[async_trait::async_trait]
    impl crate::toolkits::Tool for FlakyTool {
        fn name(&self) -> &str {
            "flaky"
        }

        fn description(&self) -> &str {
            "Fails."
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _args: serde_json::Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
            if self.model_down {
                Err(ToolError::Model(crate::error::LlmError::RequestFailed("connection refused".to_string())))
            } else {
                Err(ToolError::InvalidParameters("missing field".to_string()))
            }
        }
    }

    struct FlakyToolkit(bool);

    impl crate::toolkits::Toolkit for FlakyToolkit {
        fn name(&self) -> &str {
            "flaky"
        }

        fn tools(&self) -> Vec<std::sync::Arc<dyn crate::toolkits::Tool>> {
            vec![std::sync::Arc::new(FlakyTool { model_down: self.0 })]
        }
    }

    fn flaky_tools(model_down: bool) -> ToolSet {
        let mut tools = ToolSet::new();
        tools.extend_from(&FlakyToolkit(model_down));
        tools
    }

    #[tokio::test]
    async fn test_model_error_inside_tool_ends_step() {
        let (model, provider) = scripted_model([r#"{"tool": "flaky", "arguments": {}}"#, "unreachable"]);
        let mut agent = ChatAgent::new("assistant", "sys", AgentParams::assistant(model, flaky_tools(true)));

        let result = agent.step("go").await;
        assert!(matches!(result, Err(AgentError::Llm(_))));
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test]
    async fn test_other_tool_errors_become_observations() {
        let (model, provider) = scripted_model([r#"{"tool": "flaky", "arguments": {}}"#, "Giving up."]);
        let mut agent = ChatAgent::new("assistant", "sys", AgentParams::assistant(model, flaky_tools(false)));

        let response = agent.step("go").await.expect("step");
        assert_eq!(response.content, "Giving up.");
        assert!(!response.tool_calls[0].success);
        let feedback = provider.requests()[1].messages.last().map(|m| m.text()).unwrap_or_default();
        assert!(feedback.starts_with("Tool 'flaky' failed:"));
        assert!(feedback.contains("missing field"));
    }
}
