//! Two-agent role-playing session.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::prompts::{
    assistant_system_prompt, assistant_turn_input, user_system_prompt, user_turn_input,
    FINAL_ANSWER_PROMPT, KICKOFF_PROMPT, TASK_DONE,
};
use crate::agents::{AgentParams, ChatAgent, ToolCallRecord};
pub use crate::config::DEFAULT_ROUND_LIMIT;
use crate::error::AgentError;
use crate::llm::Usage;
use crate::toolkits::ToolContext;

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The user agent replied with the done marker.
    TaskDone,
    /// The round limit was reached first.
    RoundLimit,
}

/// One instruction and the reply to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub round: usize,
    pub user: String,
    pub assistant: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Everything a finished session produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocietyOutcome {
    pub history: Vec<ChatTurn>,
    /// The assistant's reply to the closing answer request.
    pub final_response: String,
    pub termination: Termination,
    pub usage: Usage,
}

impl SocietyOutcome {
    /// Rounds with an assistant reply.
    pub fn rounds(&self) -> usize {
        self.history.len()
    }

    /// Tool calls across all rounds.
    pub fn tool_call_count(&self) -> usize {
        self.history.iter().map(|t| t.tool_calls.len()).sum()
    }
}

/// A user agent instructing an assistant agent on one task.
pub struct RolePlaying {
    task: String,
    user: ChatAgent,
    assistant: ChatAgent,
    round_limit: usize,
}

impl RolePlaying {
    pub fn new(
        task: impl Into<String>,
        user_role: &str,
        user_params: AgentParams,
        assistant_role: &str,
        assistant_params: AgentParams,
        round_limit: usize,
    ) -> Self {
        let task = task.into();
        let user = ChatAgent::new(
            user_role,
            user_system_prompt(user_role, assistant_role, &task),
            user_params,
        );
        let assistant = ChatAgent::new(
            assistant_role,
            assistant_system_prompt(assistant_role, user_role, &task),
            assistant_params,
        );

        Self {
            task,
            user,
            assistant,
            round_limit: round_limit.max(1),
        }
    }

    /// Set the context the assistant's tools run in.
    pub fn with_context(mut self, ctx: ToolContext) -> Self {
        self.assistant = self.assistant.with_context(ctx);
        self
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn round_limit(&self) -> usize {
        self.round_limit
    }

    /// Run rounds until the user signals completion or the limit is hit,
    /// then ask the assistant for its final answer.
    pub async fn run(mut self) -> Result<SocietyOutcome, AgentError> {
        let mut history = Vec::new();
        let mut usage = Usage::default();
        let mut termination = Termination::RoundLimit;
        let mut user_input = KICKOFF_PROMPT.to_string();

        for round in 0..self.round_limit {
            let instruction = self.user.step(&user_input).await?;
            usage.accumulate(&instruction.usage);
            if instruction.content.contains(TASK_DONE) {
                info!(round, "User agent marked the task as done");
                termination = Termination::TaskDone;
                break;
            }

            let solution = self
                .assistant
                .step(&assistant_turn_input(&instruction.content, &self.task))
                .await?;
            usage.accumulate(&solution.usage);
            debug!(
                round,
                tool_calls = solution.tool_calls.len(),
                "Assistant replied"
            );

            user_input = user_turn_input(&solution.content, &self.task);
            history.push(ChatTurn {
                round,
                user: instruction.content,
                assistant: solution.content,
                tool_calls: solution.tool_calls,
            });
        }

        let final_response = self.assistant.step(FINAL_ANSWER_PROMPT).await?;
        usage.accumulate(&final_response.usage);
        info!(
            rounds = history.len(),
            termination = ?termination,
            total_tokens = usage.total_tokens,
            "Role-playing session finished"
        );

        Ok(SocietyOutcome {
            history,
            final_response: final_response.content,
            termination,
            usage,
        })
    }
}
