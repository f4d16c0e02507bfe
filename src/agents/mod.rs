//! Chat agents that converse with a model and call tools.

pub mod chat_agent;
pub mod params;
pub mod parser;
pub mod prompts;

pub use chat_agent::{AgentResponse, ChatAgent, ToolCallRecord, DEFAULT_MAX_TOOL_CALLS};
pub use params::AgentParams;
pub use parser::{JsonToolCallParser, ToolCall, ToolCallParser};
