//! Prompts used by chat agents to describe and drive tool use.

/// Instructions appended to the system message of an agent that carries tools.
pub const TOOL_USE_PROMPT: &str = r#"## Using Tools

You can call tools to gather information or run code. To call a tool, reply with a single JSON object and nothing else:

```json
{"tool": "<tool name>", "arguments": {"<parameter>": "<value>"}}
```

Only one tool call per reply. The tool result is sent back to you in the next message; read it before deciding what to do next. When you no longer need a tool, reply in plain text without any JSON tool call.
"#;

/// Sent when the agent keeps calling tools past its per-step budget.
pub const TOOL_LIMIT_PROMPT: &str = "You have used the maximum number of tool calls for this step. \
Do not call any more tools. Reply now in plain text with what you have found so far.";

/// Render tool definitions as markdown for the system message.
///
/// # Arguments
///
/// * `tools_json` - JSON array of function definitions, as produced by
///   `ToolSet::to_json_schema`
pub fn build_tool_prompt(tools_json: &serde_json::Value) -> String {
    let tools = tools_json
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|tool| {
                    let function = tool.get("function")?;
                    let name = function.get("name")?.as_str()?;
                    let description = function.get("description")?.as_str()?;
                    let params = function.get("parameters")?;

                    Some(format!(
                        "### {}\n\n{}\n\nParameters:\n```json\n{}\n```",
                        name,
                        description,
                        serde_json::to_string_pretty(params).unwrap_or_default()
                    ))
                })
                .collect::<Vec<_>>()
                .join("\n\n---\n\n")
        })
        .unwrap_or_default();

    format!("{}\n## Tool Definitions\n\n{}", TOOL_USE_PROMPT, tools)
}

/// Observation text for a tool call that named no available tool.
pub fn unknown_tool_observation(name: &str, available: &[&str]) -> String {
    format!(
        "Tool '{}' is not available. Available tools: {}",
        name,
        available.join(", ")
    )
}
