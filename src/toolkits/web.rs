//! Web browsing toolkit.
//!
//! `browse_url` works on fetched page text rather than a live browser. The
//! planning model first writes a short plan for the task; the web model is
//! then shown the current page and either answers or asks to follow a link,
//! for a bounded number of navigation steps.

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use super::{http_client, parse_args, require_non_empty, Tool, ToolContext, ToolError, ToolResult, Toolkit};
use crate::error::ToolkitError;
use crate::llm::Message;
use crate::models::ModelHandle;
use crate::utils::{fetch_text, html_to_text, is_url, truncate_chars};

/// Pages visited per `browse_url` call.
const MAX_NAVIGATION_STEPS: usize = 5;

/// Page text shown to the web model per step.
const MAX_PAGE_CHARS: usize = 30_000;

/// Links listed per page.
const MAX_LINKS: usize = 60;

const PLANNING_PROMPT: &str = "You plan web browsing tasks. Given a task and a starting url, \
write a short numbered plan (at most five steps) describing what to look for on the page and \
which links are likely to lead to the answer. Do not answer the task yourself.";

const BROWSING_PROMPT: &str = "You are a web browsing agent working from page text. \
Each turn you see the task, a plan, the current url, the page text and its links. \
If the page answers the task, reply with `ANSWER: <answer and supporting details>`. \
Otherwise reply with exactly one line `NAVIGATE: <absolute url>` naming a listed link to open next.";

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"'#]+)["'][^>]*>(.*?)</a>"#)
            .expect("Invalid regex for link")
    })
}

/// `(text, absolute url)` pairs of a page's http(s) links, deduplicated.
fn extract_links(html: &str, base: &Url) -> Vec<(String, String)> {
    let mut links: Vec<(String, String)> = Vec::new();
    for cap in link_re().captures_iter(html) {
        let Ok(url) = base.join(cap[1].trim()) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        let url = url.to_string();
        if links.iter().any(|(_, u)| *u == url) {
            continue;
        }
        let text = html_to_text(&cap[2]).replace('\n', " ");
        links.push((text, url));
        if links.len() >= MAX_LINKS {
            break;
        }
    }
    links
}

/// What the web model asked for.
#[derive(Debug, PartialEq)]
enum BrowseDecision {
    Answer(String),
    Navigate(String),
}

fn parse_decision(reply: &str) -> BrowseDecision {
    for line in reply.lines() {
        if let Some(rest) = line.trim().strip_prefix("NAVIGATE:") {
            let target = rest.trim().trim_matches(|c| c == '<' || c == '>' || c == '`');
            if is_url(target) {
                return BrowseDecision::Navigate(target.to_string());
            }
        }
    }
    let answer = reply.trim();
    BrowseDecision::Answer(
        answer
            .strip_prefix("ANSWER:")
            .map(str::trim)
            .unwrap_or(answer)
            .to_string(),
    )
}

/// Toolkit exposing `browse_url`.
pub struct WebToolkit {
    headless: bool,
    web_agent_model: ModelHandle,
    planning_agent_model: ModelHandle,
    client: Client,
}

impl WebToolkit {
    pub fn new(
        headless: bool,
        web_agent_model: ModelHandle,
        planning_agent_model: ModelHandle,
    ) -> Result<Self, ToolkitError> {
        info!(headless, "Web toolkit uses fetched page text; no browser window is opened");
        Ok(Self {
            headless,
            web_agent_model,
            planning_agent_model,
            client: http_client("web", 60)?,
        })
    }

    pub fn headless(&self) -> bool {
        self.headless
    }
}

impl Toolkit for WebToolkit {
    fn name(&self) -> &str {
        "web"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(BrowseUrlTool {
            web: self.web_agent_model.clone(),
            planner: self.planning_agent_model.clone(),
            client: self.client.clone(),
        })]
    }
}

#[derive(Debug, Deserialize)]
struct BrowseParams {
    task_prompt: String,
    start_url: String,
}

struct BrowseUrlTool {
    web: ModelHandle,
    planner: ModelHandle,
    client: Client,
}

impl BrowseUrlTool {
    async fn browse(&self, task: &str, start_url: &str) -> Result<String, ToolError> {
        let plan = self
            .planner
            .complete_text(vec![
                Message::system(PLANNING_PROMPT),
                Message::user(format!("Task: {}\nStarting url: {}", task, start_url)),
            ])
            .await?;
        debug!(plan = %plan, "Browsing plan");

        let mut current = start_url.to_string();
        let mut visited: Vec<String> = Vec::new();
        let mut conversation = vec![Message::system(BROWSING_PROMPT)];

        for step in 0..MAX_NAVIGATION_STEPS {
            let base = Url::parse(&current)
                .map_err(|e| ToolError::InvalidParameters(format!("Invalid url '{}': {}", current, e)))?;
            let page = match fetch_text(&self.client, &current).await {
                Ok(html) => {
                    let links = extract_links(&html, &base)
                        .into_iter()
                        .map(|(text, url)| format!("- [{}]({})", text, url))
                        .collect::<Vec<_>>()
                        .join("\n");
                    format!(
                        "Page text:\n{}\n\nLinks:\n{}",
                        truncate_chars(&html_to_text(&html), MAX_PAGE_CHARS),
                        links
                    )
                }
                Err(e) => format!("The page could not be loaded: {}", e),
            };
            visited.push(current.clone());
            info!(step, url = %current, "Visited page");

            conversation.push(Message::user(format!(
                "Task: {}\n\nPlan:\n{}\n\nCurrent url: {}\n\n{}",
                task, plan, current, page
            )));
            let reply = self.web.complete_text(conversation.clone()).await?;
            conversation.push(Message::assistant(reply.clone()));

            match parse_decision(&reply) {
                BrowseDecision::Answer(answer) => return Ok(answer),
                BrowseDecision::Navigate(next) if visited.contains(&next) => {
                    conversation.push(Message::user(format!(
                        "{} was already visited. Answer from what you have seen so far.",
                        next
                    )));
                    let reply = self.web.complete_text(conversation).await?;
                    return Ok(match parse_decision(&reply) {
                        BrowseDecision::Answer(answer) => answer,
                        BrowseDecision::Navigate(_) => reply,
                    });
                }
                BrowseDecision::Navigate(next) => current = next,
            }
        }

        Err(ToolError::ExecutionFailed(format!(
            "No answer after visiting {} pages: {}",
            visited.len(),
            visited.join(", ")
        )))
    }
}

#[async_trait]
impl Tool for BrowseUrlTool {
    fn name(&self) -> &str {
        "browse_url"
    }

    fn description(&self) -> &str {
        "Browse from a starting url to complete a task that needs information from web pages, following links when needed."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_prompt": {
                    "type": "string",
                    "description": "What to find or do on the website"
                },
                "start_url": {
                    "type": "string",
                    "description": "Url to start browsing from"
                }
            },
            "required": ["task_prompt", "start_url"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let params: BrowseParams = parse_args(args)?;
        require_non_empty("task_prompt", &params.task_prompt)?;
        if !is_url(params.start_url.trim()) {
            return Err(ToolError::InvalidParameters(format!(
                "start_url must be an http(s) url, got '{}'",
                params.start_url
            )));
        }

        match self.browse(params.task_prompt.trim(), params.start_url.trim()).await {
            Ok(answer) => Ok(ToolResult::success(answer)),
            Err(ToolError::ExecutionFailed(msg)) => Ok(ToolResult::failure(msg)),
            Err(e) => Err(e),
        }
    }
}
