//! Parameter bundles handed to the role-playing society.

use crate::models::ModelHandle;
use crate::toolkits::ToolSet;

/// Model and optional tools for one agent role.
#[derive(Debug, Clone)]
pub struct AgentParams {
    pub model: ModelHandle,
    pub tools: Option<ToolSet>,
}

impl AgentParams {
    /// Bundle for the instructing role; never carries tools.
    pub fn user(model: ModelHandle) -> Self {
        Self { model, tools: None }
    }

    /// Bundle for the solving role; always carries tools.
    pub fn assistant(model: ModelHandle, tools: ToolSet) -> Self {
        Self {
            model,
            tools: Some(tools),
        }
    }

    /// Number of tools carried, zero when none.
    pub fn tool_count(&self) -> usize {
        self.tools.as_ref().map_or(0, ToolSet::len)
    }
}
