//! Document extraction toolkit.
//!
//! Turns a local file or a remote url into text the assistant can read.
//! Dispatch is by extension; remote documents are downloaded into the
//! scratch directory first, and extension-less urls are treated as web pages.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::excel::{extract_table_content, read_zip_text};
use super::{http_client, parse_args, require_non_empty, Tool, ToolContext, ToolError, ToolResult, Toolkit};
use crate::error::ToolkitError;
use crate::utils::{decode_entities, extension_of, fetch_text, html_to_text, is_url, resolve_local, truncate_chars};

/// Characters returned before truncating.
const MAX_DOCUMENT_CHARS: usize = 60_000;

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "py", "rs", "js", "ts", "c", "cpp", "h", "java", "sh", "yaml", "yml",
    "toml", "ini", "log", "tex", "pdb", "xml", "srt",
];

const TABLE_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "csv", "tsv"];

/// Extensions dispatched to a file reader rather than fetched as a page.
fn is_document_extension(ext: &str) -> bool {
    TABLE_EXTENSIONS.contains(&ext)
        || TEXT_EXTENSIONS.contains(&ext)
        || matches!(ext, "docx" | "pdf" | "json" | "jsonl")
}

/// Toolkit exposing `extract_document_content`.
pub struct DocumentProcessingToolkit {
    client: Client,
}

impl DocumentProcessingToolkit {
    pub fn new() -> Result<Self, ToolkitError> {
        Ok(Self {
            client: http_client("document_processing", 60)?,
        })
    }
}

impl Toolkit for DocumentProcessingToolkit {
    fn name(&self) -> &str {
        "document_processing"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(ExtractDocumentTool {
            client: self.client.clone(),
        })]
    }
}

#[derive(Debug, Deserialize)]
struct ExtractDocumentParams {
    document_path: String,
}

struct ExtractDocumentTool {
    client: Client,
}

impl ExtractDocumentTool {
    async fn extract(&self, source: &str, ctx: &ToolContext) -> Result<String, ToolError> {
        let ext = extension_of(source);

        // Urls without a known document extension are web pages.
        if is_url(source) && !ext.as_deref().is_some_and(is_document_extension) {
            debug!(url = source, "Extracting web page");
            let html = fetch_text(&self.client, source).await?;
            return Ok(html_to_text(&html));
        }

        let path = resolve_local(&self.client, source, &ctx.working_dir).await?;
        let ext = ext.unwrap_or_default();
        match ext.as_str() {
            e if TABLE_EXTENSIONS.contains(&e) => {
                tokio::task::spawn_blocking(move || extract_table_content(&path))
                    .await
                    .map_err(|e| ToolError::ExecutionFailed(format!("Reader task failed: {}", e)))?
            }
            "docx" => {
                let bytes = read_file(&path).await?;
                extract_docx(&bytes)
            }
            "pdf" => extract_pdf(&path, ctx.default_timeout).await,
            "html" | "htm" => Ok(html_to_text(&read_text(&path).await?)),
            "json" => {
                let raw = read_text(&path).await?;
                match serde_json::from_str::<Value>(&raw) {
                    Ok(value) => serde_json::to_string_pretty(&value)
                        .map_err(|e| ToolError::ExecutionFailed(e.to_string())),
                    Err(_) => Ok(raw),
                }
            }
            "jsonl" => read_text(&path).await,
            e if TEXT_EXTENSIONS.contains(&e) => read_text(&path).await,
            other => {
                // Unknown extension: accept it if it decodes as UTF-8.
                let bytes = read_file(&path).await?;
                String::from_utf8(bytes).map_err(|_| {
                    ToolError::UnsupportedFormat(format!(
                        "cannot extract text from '.{}' files",
                        other
                    ))
                })
            }
        }
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>, ToolError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| ToolError::FilesystemError(format!("{}: {}", path.display(), e)))
}

async fn read_text(path: &Path) -> Result<String, ToolError> {
    Ok(String::from_utf8_lossy(&read_file(path).await?).into_owned())
}

fn paragraph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<w:p\b[^>]*>(.*?)</w:p>").expect("Invalid regex for paragraph"))
}

fn run_text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<w:t\b[^>]*>(.*?)</w:t>").expect("Invalid regex for run text"))
}

/// Paragraph text of a `.docx` file.
fn extract_docx(bytes: &[u8]) -> Result<String, ToolError> {
    let xml = read_zip_text(bytes, "word/document.xml")?
        .ok_or_else(|| ToolError::UnsupportedFormat("missing word/document.xml".to_string()))?;

    let paragraphs: Vec<String> = paragraph_re()
        .captures_iter(&xml)
        .map(|p| {
            run_text_re()
                .captures_iter(&p[1])
                .map(|t| decode_entities(&t[1]))
                .collect::<String>()
        })
        .filter(|p| !p.trim().is_empty())
        .collect();
    Ok(paragraphs.join("\n"))
}

/// Runs `pdftotext` on the file and returns its output.
async fn extract_pdf(path: &Path, timeout_seconds: u64) -> Result<String, ToolError> {
    let child = Command::new("pdftotext")
        .args(["-layout", "-enc", "UTF-8"])
        .arg(path)
        .arg("-")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ToolError::NotAvailable(format!("pdftotext is required for PDF files: {}", e)))?;

    let output = tokio::time::timeout(Duration::from_secs(timeout_seconds), child.wait_with_output())
        .await
        .map_err(|_| ToolError::Timeout {
            seconds: timeout_seconds,
        })?
        .map_err(|e| ToolError::ExecutionFailed(format!("pdftotext failed: {}", e)))?;

    if !output.status.success() {
        return Err(ToolError::ExecutionFailed(format!(
            "pdftotext exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[async_trait]
impl Tool for ExtractDocumentTool {
    fn name(&self) -> &str {
        "extract_document_content"
    }

    fn description(&self) -> &str {
        "Extract the text content of a document (text, HTML, JSON, PDF, DOCX, spreadsheet) from a local path or an http(s) url."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "document_path": {
                    "type": "string",
                    "description": "Local path or url of the document"
                }
            },
            "required": ["document_path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let params: ExtractDocumentParams = parse_args(args)?;
        require_non_empty("document_path", &params.document_path)?;

        match self.extract(params.document_path.trim(), ctx).await {
            Ok(text) => Ok(ToolResult::success(truncate_chars(&text, MAX_DOCUMENT_CHARS))),
            Err(e) => Ok(ToolResult::failure(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkits::excel::tests::{build_zip, sample_workbook};

    fn tool() -> Arc<dyn Tool> {
        DocumentProcessingToolkit::new()
            .expect("toolkit")
            .tools()
            .remove(0)
    }

    async fn extract(dir: &Path, file: &str, content: &[u8]) -> ToolResult {
        let path = dir.join(file);
        std::fs::write(&path, content).expect("write fixture");
        tool()
            .execute(serde_json::json!({"document_path": path}), &ToolContext::new(dir))
            .await
            .expect("execute")
    }

    #[tokio::test]
    async fn test_plain_text_returned_as_is() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = extract(dir.path(), "notes.txt", b"line one\nline two").await;
        assert!(result.success);
        assert_eq!(result.output, "line one\nline two");
    }

    #[tokio::test]
    async fn test_html_is_stripped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = extract(dir.path(), "p.html", b"<p>Hello <b>there</b></p><script>x()</script>").await;
        assert!(result.success);
        assert_eq!(result.output, "Hello there");
    }

    #[tokio::test]
    async fn test_json_is_pretty_printed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = extract(dir.path(), "d.json", br#"{"a":[1,2]}"#).await;
        assert!(result.success);
        assert!(result.output.contains("\n  \"a\": ["));
    }

    #[tokio::test]
    async fn test_spreadsheet_delegates_to_excel_reader() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = extract(dir.path(), "b.xlsx", &sample_workbook(false)).await;
        assert!(result.success);
        assert!(result.output.contains("## Sheet: Sales"));
    }

    #[tokio::test]
    async fn test_docx_paragraphs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let docx = build_zip(
            &[(
                "word/document.xml",
                r#"<w:document><w:body><w:p><w:r><w:t>First</w:t></w:r><w:r><w:t xml:space="preserve"> para</w:t></w:r></w:p><w:p></w:p><w:p><w:r><w:t>Second &amp; last</w:t></w:r></w:p></w:body></w:document>"#,
            )],
            true,
        );
        let result = extract(dir.path(), "r.docx", &docx).await;
        assert!(result.success);
        assert_eq!(result.output, "First para\nSecond & last");
    }

    #[tokio::test]
    async fn test_binary_is_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = extract(dir.path(), "blob.bin", &[0xff, 0xfe, 0x00, 0x81]).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap_or("").contains("Unsupported format"));
    }

    #[tokio::test]
    async fn test_missing_file_is_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = tool()
            .execute(
                serde_json::json!({"document_path": dir.path().join("none.txt")}),
                &ToolContext::new(dir.path()),
            )
            .await
            .expect("execute");
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_url_pages_are_stripped() {
        let page = "<html><body><p>Hello <b>world</b></p></body></html>".to_string();
        let base = crate::toolkits::testing::serve_pages(vec![
            ("/", page.clone()),
            ("/wiki/J._R._R._Tolkien", page),
        ])
        .await;
        let dir = tempfile::tempdir().expect("tempdir");

        for url in [format!("{}/", base), format!("{}/wiki/J._R._R._Tolkien", base)] {
            let result = tool()
                .execute(serde_json::json!({"document_path": url}), &ToolContext::new(dir.path()))
                .await
                .expect("execute");
            assert!(result.success, "{:?}", result.error);
            assert_eq!(result.output, "Hello world");
        }
    }
}
