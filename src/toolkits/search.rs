//! Web search toolkit.
//!
//! Wraps a handful of public search APIs: Wikipedia page summaries, the
//! DuckDuckGo instant answer API, Google Custom Search (when configured),
//! and the Wayback Machine availability API. `web_search` fans out to the
//! keyless backends concurrently and lets the search model write an answer
//! from the combined evidence.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{http_client, parse_args, require_non_empty, Tool, ToolContext, ToolError, ToolResult, Toolkit};
use crate::config::Credentials;
use crate::error::ToolkitError;
use crate::llm::Message;
use crate::models::ModelHandle;
use crate::utils::{fetch_text, html_to_text, truncate_chars};

const WIKIPEDIA_SUMMARY_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";
const DUCKDUCKGO_URL: &str = "https://api.duckduckgo.com/";
const GOOGLE_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";
const WAYBACK_AVAILABLE_URL: &str = "https://archive.org/wayback/available";

/// Related topics kept from a DuckDuckGo response.
const MAX_DDG_RESULTS: usize = 10;

/// Characters of an archived page returned to the agent.
const MAX_ARCHIVE_CHARS: usize = 20_000;

const SYNTHESIS_PROMPT: &str = "You are a research assistant. Answer the question using only \
the search evidence below. Cite the source urls you relied on. If the evidence is insufficient, \
say so and describe what is missing.";

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

impl SearchHit {
    fn render(&self, index: usize) -> String {
        format!(
            "{}. {}\n   {}\n   {}",
            index + 1,
            self.title,
            self.snippet,
            self.url
        )
    }
}

fn render_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| hit.render(i))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text summary of a Wikipedia REST summary payload.
fn parse_wiki_summary(body: &Value) -> Option<String> {
    let extract = body.get("extract")?.as_str()?.trim();
    if extract.is_empty() {
        return None;
    }
    let title = body.get("title").and_then(Value::as_str).unwrap_or("");
    let mut out = format!("{}\n{}", title, extract);
    if let Some(url) = body
        .pointer("/content_urls/desktop/page")
        .and_then(Value::as_str)
    {
        out.push_str(&format!("\nSource: {}", url));
    }
    Some(out)
}

/// Results of a DuckDuckGo instant answer payload.
fn parse_duckduckgo(body: &Value) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    let str_field = |v: &Value, key: &str| {
        v.get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string()
    };

    let answer = str_field(body, "Answer");
    if !answer.is_empty() {
        hits.push(SearchHit {
            title: "Instant answer".to_string(),
            snippet: answer,
            url: String::new(),
        });
    }

    let abstract_text = str_field(body, "AbstractText");
    if !abstract_text.is_empty() {
        hits.push(SearchHit {
            title: str_field(body, "Heading"),
            snippet: abstract_text,
            url: str_field(body, "AbstractURL"),
        });
    }

    fn collect_topics(topics: &[Value], out: &mut Vec<SearchHit>) {
        for topic in topics {
            if let Some(nested) = topic.get("Topics").and_then(Value::as_array) {
                collect_topics(nested, out);
                continue;
            }
            let text = topic.get("Text").and_then(Value::as_str).unwrap_or("");
            if text.is_empty() {
                continue;
            }
            let title = text.split(" - ").next().unwrap_or(text).to_string();
            out.push(SearchHit {
                title,
                snippet: text.to_string(),
                url: topic
                    .get("FirstURL")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
            });
        }
    }

    if let Some(topics) = body.get("RelatedTopics").and_then(Value::as_array) {
        collect_topics(topics, &mut hits);
    }
    hits.truncate(MAX_DDG_RESULTS);
    hits
}

/// Results of a Google Custom Search payload.
fn parse_google(body: &Value) -> Vec<SearchHit> {
    body.get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| SearchHit {
                    title: item["title"].as_str().unwrap_or("").to_string(),
                    snippet: item["snippet"].as_str().unwrap_or("").replace('\n', " "),
                    url: item["link"].as_str().unwrap_or("").to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `(snapshot url, timestamp)` of the closest available Wayback snapshot.
fn parse_wayback(body: &Value) -> Option<(String, String)> {
    let closest = body.pointer("/archived_snapshots/closest")?;
    if !closest.get("available").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    Some((
        closest.get("url")?.as_str()?.to_string(),
        closest
            .get("timestamp")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
    ))
}

/// Checks a `YYYYMMDD` (optionally down to seconds) Wayback timestamp.
fn validate_timestamp(date: &str) -> Result<(), ToolError> {
    let digits = date.trim();
    if digits.len() < 4 || digits.len() > 14 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ToolError::InvalidParameters(format!(
            "date must look like YYYYMMDD, got '{}'",
            date
        )));
    }
    Ok(())
}

/// Shared state of the search tools.
struct SearchBackend {
    client: Client,
    model: ModelHandle,
    google: Option<(String, String)>,
}

impl SearchBackend {
    async fn get_json(&self, url: &str) -> Result<Value, ToolError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Search request failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "Search backend returned HTTP {}",
                status.as_u16()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Invalid search response: {}", e)))
    }

    async fn wiki(&self, entity: &str) -> Result<Option<String>, ToolError> {
        let title = entity.trim().replace(' ', "_");
        let url = format!("{}/{}", WIKIPEDIA_SUMMARY_URL, urlencoding::encode(&title));
        match self.get_json(&url).await {
            Ok(body) => Ok(parse_wiki_summary(&body)),
            // The summary endpoint answers 404 for unknown titles.
            Err(ToolError::ExecutionFailed(msg)) if msg.contains("HTTP 404") => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn duckduckgo(&self, query: &str) -> Result<Vec<SearchHit>, ToolError> {
        let url = format!(
            "{}?q={}&format=json&no_html=1&skip_disambig=1",
            DUCKDUCKGO_URL,
            urlencoding::encode(query.trim())
        );
        Ok(parse_duckduckgo(&self.get_json(&url).await?))
    }

    async fn google(&self, query: &str) -> Result<Vec<SearchHit>, ToolError> {
        let (key, engine) = self.google.as_ref().ok_or_else(|| {
            ToolError::NotAvailable(
                "Google search is not configured: set GOOGLE_API_KEY and SEARCH_ENGINE_ID".to_string(),
            )
        })?;
        let url = format!(
            "{}?key={}&cx={}&q={}&num=10",
            GOOGLE_SEARCH_URL,
            urlencoding::encode(key),
            urlencoding::encode(engine),
            urlencoding::encode(query.trim())
        );
        Ok(parse_google(&self.get_json(&url).await?))
    }

    async fn archived(&self, page_url: &str, date: &str) -> Result<String, ToolError> {
        validate_timestamp(date)?;
        let url = format!(
            "{}?url={}&timestamp={}",
            WAYBACK_AVAILABLE_URL,
            urlencoding::encode(page_url.trim()),
            date.trim()
        );
        let (snapshot, timestamp) = parse_wayback(&self.get_json(&url).await?).ok_or_else(|| {
            ToolError::ExecutionFailed(format!("No archived snapshot of {} near {}", page_url, date))
        })?;

        let html = fetch_text(&self.client, &snapshot).await?;
        Ok(format!(
            "Archived snapshot {} ({})\n\n{}",
            snapshot,
            timestamp,
            truncate_chars(&html_to_text(&html), MAX_ARCHIVE_CHARS)
        ))
    }

    async fn web_search(&self, question: &str) -> Result<String, ToolError> {
        let (wiki, ddg) = futures::join!(self.wiki(question), self.duckduckgo(question));

        let mut evidence = Vec::new();
        match wiki {
            Ok(Some(summary)) => evidence.push(format!("[Wikipedia]\n{}", summary)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Wikipedia lookup failed"),
        }
        match ddg {
            Ok(hits) if !hits.is_empty() => {
                evidence.push(format!("[DuckDuckGo]\n{}", render_hits(&hits)))
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "DuckDuckGo lookup failed"),
        }
        if self.google.is_some() {
            match self.google(question).await {
                Ok(hits) if !hits.is_empty() => {
                    evidence.push(format!("[Google]\n{}", render_hits(&hits)))
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Google lookup failed"),
            }
        }

        if evidence.is_empty() {
            return Err(ToolError::ExecutionFailed(format!(
                "No search results for '{}'",
                question
            )));
        }
        debug!(sources = evidence.len(), "Synthesizing search answer");

        let answer = self
            .model
            .complete_text(vec![
                Message::system(SYNTHESIS_PROMPT),
                Message::user(format!(
                    "Question: {}\n\nEvidence:\n{}",
                    question.trim(),
                    evidence.join("\n\n")
                )),
            ])
            .await?;
        Ok(answer)
    }
}

/// Toolkit exposing the five search tools.
pub struct SearchToolkit {
    backend: Arc<SearchBackend>,
}

impl SearchToolkit {
    pub fn new(model: ModelHandle, credentials: &Credentials) -> Result<Self, ToolkitError> {
        let google = match (&credentials.google_api_key, &credentials.search_engine_id) {
            (Some(key), Some(engine)) => Some((key.clone(), engine.clone())),
            _ => None,
        };
        Ok(Self {
            backend: Arc::new(SearchBackend {
                client: http_client("search", 30)?,
                model,
                google,
            }),
        })
    }

    /// True when Google Custom Search credentials were supplied.
    pub fn google_enabled(&self) -> bool {
        self.backend.google.is_some()
    }
}

impl Toolkit for SearchToolkit {
    fn name(&self) -> &str {
        "search"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        [
            SearchKind::Wiki,
            SearchKind::DuckDuckGo,
            SearchKind::Google,
            SearchKind::Archived,
            SearchKind::WebSearch,
        ]
        .into_iter()
        .map(|kind| {
            Arc::new(SearchTool {
                kind,
                backend: self.backend.clone(),
            }) as Arc<dyn Tool>
        })
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchKind {
    Wiki,
    DuckDuckGo,
    Google,
    Archived,
    WebSearch,
}

#[derive(Debug, Deserialize)]
struct EntityParams {
    entity: String,
}

#[derive(Debug, Deserialize)]
struct QueryParams {
    query: String,
}

#[derive(Debug, Deserialize)]
struct ArchivedParams {
    url: String,
    date: String,
}

#[derive(Debug, Deserialize)]
struct QuestionParams {
    question: String,
}

struct SearchTool {
    kind: SearchKind,
    backend: Arc<SearchBackend>,
}

impl SearchTool {
    async fn run(&self, args: Value) -> Result<String, ToolError> {
        match self.kind {
            SearchKind::Wiki => {
                let p: EntityParams = parse_args(args)?;
                require_non_empty("entity", &p.entity)?;
                self.backend.wiki(&p.entity).await?.ok_or_else(|| {
                    ToolError::ExecutionFailed(format!("No Wikipedia page found for '{}'", p.entity))
                })
            }
            SearchKind::DuckDuckGo => {
                let p: QueryParams = parse_args(args)?;
                require_non_empty("query", &p.query)?;
                let hits = self.backend.duckduckgo(&p.query).await?;
                if hits.is_empty() {
                    return Err(ToolError::ExecutionFailed(format!(
                        "No DuckDuckGo results for '{}'",
                        p.query
                    )));
                }
                Ok(render_hits(&hits))
            }
            SearchKind::Google => {
                let p: QueryParams = parse_args(args)?;
                require_non_empty("query", &p.query)?;
                let hits = self.backend.google(&p.query).await?;
                if hits.is_empty() {
                    return Err(ToolError::ExecutionFailed(format!(
                        "No Google results for '{}'",
                        p.query
                    )));
                }
                Ok(render_hits(&hits))
            }
            SearchKind::Archived => {
                let p: ArchivedParams = parse_args(args)?;
                require_non_empty("url", &p.url)?;
                self.backend.archived(&p.url, &p.date).await
            }
            SearchKind::WebSearch => {
                let p: QuestionParams = parse_args(args)?;
                require_non_empty("question", &p.question)?;
                self.backend.web_search(&p.question).await
            }
        }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        match self.kind {
            SearchKind::Wiki => "search_wiki",
            SearchKind::DuckDuckGo => "search_duckduckgo",
            SearchKind::Google => "search_google",
            SearchKind::Archived => "search_archived_webpage",
            SearchKind::WebSearch => "web_search",
        }
    }

    fn description(&self) -> &str {
        match self.kind {
            SearchKind::Wiki => "Look up an entity on Wikipedia and return the page summary.",
            SearchKind::DuckDuckGo => "Search DuckDuckGo instant answers and related topics.",
            SearchKind::Google => "Search Google (Custom Search API) and return titles, snippets and links.",
            SearchKind::Archived => {
                "Fetch the Wayback Machine snapshot of a url closest to a date (YYYYMMDD)."
            }
            SearchKind::WebSearch => {
                "Search several engines for a question and return a synthesized answer with sources."
            }
        }
    }

    fn parameters_schema(&self) -> Value {
        let string = |desc: &str| serde_json::json!({"type": "string", "description": desc});
        let (properties, required) = match self.kind {
            SearchKind::Wiki => (
                serde_json::json!({"entity": string("Entity or page title to look up")}),
                vec!["entity"],
            ),
            SearchKind::DuckDuckGo | SearchKind::Google => (
                serde_json::json!({"query": string("Search query")}),
                vec!["query"],
            ),
            SearchKind::Archived => (
                serde_json::json!({
                    "url": string("Url of the page to look up"),
                    "date": string("Target date as YYYYMMDD")
                }),
                vec!["url", "date"],
            ),
            SearchKind::WebSearch => (
                serde_json::json!({"question": string("Question to research")}),
                vec!["question"],
            ),
        };
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        debug!(tool = self.name(), "Running search");
        match self.run(args).await {
            Ok(text) => Ok(ToolResult::success(text)),
            Err(e @ ToolError::InvalidParameters(_)) => Err(e),
            Err(ToolError::Model(e)) => Err(ToolError::Model(e)),
            Err(e) => Ok(ToolResult::failure(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkits::testing::scripted_model;

    fn toolkit(credentials: &Credentials) -> SearchToolkit {
        let (model, _) = scripted_model(Vec::<String>::new());
        SearchToolkit::new(model, credentials).expect("toolkit")
    }

    #[test]
    fn test_five_tools_in_order() {
        let kit = toolkit(&Credentials::default());
        let names: Vec<String> = kit.tools().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "search_wiki",
                "search_duckduckgo",
                "search_google",
                "search_archived_webpage",
                "web_search"
            ]
        );
        for tool in kit.tools() {
            assert!(tool.parameters_schema()["required"].is_array());
        }
    }

    #[test]
    fn test_google_enabled_requires_both_values() {
        let mut credentials = Credentials::default();
        credentials.google_api_key = Some("key".to_string());
        assert!(!toolkit(&credentials).google_enabled());
        credentials.search_engine_id = Some("cx".to_string());
        assert!(toolkit(&credentials).google_enabled());
    }

    #[tokio::test]
    async fn test_google_without_credentials_is_failure() {
        let kit = toolkit(&Credentials::default());
        let google = kit.tools().remove(2);
        let dir = tempfile::tempdir().expect("tempdir");
        let result = google
            .execute(serde_json::json!({"query": "rust"}), &ToolContext::new(dir.path()))
            .await
            .expect("execute");
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap_or("").contains("GOOGLE_API_KEY"));
    }

    #[tokio::test]
    async fn test_archived_rejects_bad_date() {
        let kit = toolkit(&Credentials::default());
        let archived = kit.tools().remove(3);
        let dir = tempfile::tempdir().expect("tempdir");
        let result = archived
            .execute(
                serde_json::json!({"url": "https://example.org", "date": "last week"}),
                &ToolContext::new(dir.path()),
            )
            .await;
        assert!(matches!(result, Err(ToolError::InvalidParameters(_))));
    }

    #[test]
    fn test_parse_wiki_summary() {
        let body = serde_json::json!({
            "title": "Mercedes Sosa",
            "extract": "Haydée Mercedes Sosa was an Argentine singer.",
            "content_urls": {"desktop": {"page": "https://en.wikipedia.org/wiki/Mercedes_Sosa"}}
        });
        let text = parse_wiki_summary(&body).expect("summary");
        assert!(text.starts_with("Mercedes Sosa\nHaydée"));
        assert!(text.ends_with("Source: https://en.wikipedia.org/wiki/Mercedes_Sosa"));
        assert!(parse_wiki_summary(&serde_json::json!({"extract": " "})).is_none());
    }

    #[test]
    fn test_parse_duckduckgo_flattens_topics() {
        let body = serde_json::json!({
            "Heading": "Rust",
            "AbstractText": "Rust is a language.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Rust",
            "Answer": "",
            "RelatedTopics": [
                {"Text": "Cargo - package manager", "FirstURL": "https://duckduckgo.com/Cargo"},
                {"Name": "Group", "Topics": [
                    {"Text": "Ferris - mascot", "FirstURL": "https://duckduckgo.com/Ferris"}
                ]},
                {"Text": ""}
            ]
        });
        let hits = parse_duckduckgo(&body);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "Rust");
        assert_eq!(hits[1].title, "Cargo");
        assert_eq!(hits[2].url, "https://duckduckgo.com/Ferris");
        assert!(render_hits(&hits).starts_with("1. Rust\n"));
    }

    #[test]
    fn test_parse_google_items() {
        let body = serde_json::json!({
            "items": [{"title": "A", "snippet": "line\nbreak", "link": "https://a"}]
        });
        let hits = parse_google(&body);
        assert_eq!(hits[0].snippet, "line break");
        assert!(parse_google(&serde_json::json!({})).is_empty());
    }

    #[test]
    fn test_parse_wayback() {
        let body = serde_json::json!({
            "archived_snapshots": {"closest": {
                "available": true,
                "url": "http://web.archive.org/web/20200101000000/https://example.org",
                "timestamp": "20200101000000"
            }}
        });
        let (url, ts) = parse_wayback(&body).expect("snapshot");
        assert!(url.contains("web.archive.org"));
        assert_eq!(ts, "20200101000000");
        assert!(parse_wayback(&serde_json::json!({"archived_snapshots": {}})).is_none());
    }

    #[test]
    fn test_validate_timestamp() {
        assert!(validate_timestamp("20230115").is_ok());
        assert!(validate_timestamp("2023-01-15").is_err());
        assert!(validate_timestamp("12").is_err());
    }
}
