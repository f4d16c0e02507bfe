//! Image analysis toolkit backed by a vision-capable model.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::{parse_args, require_non_empty, Tool, ToolContext, ToolError, ToolResult, Toolkit};
use crate::llm::Message;
use crate::models::ModelHandle;
use crate::utils::{extension_of, is_url};

const DESCRIBE_PROMPT: &str = "Please describe the contents of the image in detail. \
Transcribe any visible text exactly, and mention numbers, labels and layout that could matter for answering questions about it.";

const QUESTION_SYSTEM_PROMPT: &str = "You are an image analysis assistant. Answer the question \
using only what is visible in the image. If the image does not contain the answer, say so.";

/// MIME type for an image file extension.
pub(crate) fn image_mime(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

/// Base64 data url for a local image file.
pub(crate) fn image_data_url(path: &Path) -> Result<String, ToolError> {
    let ext = extension_of(&path.to_string_lossy()).unwrap_or_default();
    let mime = image_mime(&ext).ok_or_else(|| {
        ToolError::UnsupportedFormat(format!("'{}' is not a supported image type", path.display()))
    })?;
    let bytes = std::fs::read(path)
        .map_err(|e| ToolError::FilesystemError(format!("{}: {}", path.display(), e)))?;
    Ok(format!("data:{};base64,{}", mime, BASE64.encode(bytes)))
}

/// Url to send for `source`: http(s) urls pass through, local files are inlined.
fn image_url_for(source: &str) -> Result<String, ToolError> {
    if is_url(source) {
        Ok(source.to_string())
    } else {
        let path = Path::new(source);
        if !path.exists() {
            return Err(ToolError::FilesystemError(format!("File not found: {}", source)));
        }
        image_data_url(path)
    }
}

/// Toolkit exposing `image_to_text` and `ask_question_about_image`.
pub struct ImageAnalysisToolkit {
    model: ModelHandle,
}

impl ImageAnalysisToolkit {
    pub fn new(model: ModelHandle) -> Self {
        Self { model }
    }
}

impl Toolkit for ImageAnalysisToolkit {
    fn name(&self) -> &str {
        "image_analysis"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![
            Arc::new(ImageToTextTool {
                model: self.model.clone(),
            }),
            Arc::new(AskImageTool {
                model: self.model.clone(),
            }),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct ImageToTextParams {
    image_path: String,
}

#[derive(Debug, Deserialize)]
struct AskImageParams {
    image_path: String,
    question: String,
}

async fn ask_model(
    model: &ModelHandle,
    messages: Vec<Message>,
) -> Result<ToolResult, ToolError> {
    let answer = model.complete_text(messages).await?;
    Ok(ToolResult::success(answer))
}

struct ImageToTextTool {
    model: ModelHandle,
}

#[async_trait]
impl Tool for ImageToTextTool {
    fn name(&self) -> &str {
        "image_to_text"
    }

    fn description(&self) -> &str {
        "Generate a detailed textual description of an image, including any text it contains."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "image_path": {
                    "type": "string",
                    "description": "Local path or url of the image"
                }
            },
            "required": ["image_path"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let params: ImageToTextParams = parse_args(args)?;
        require_non_empty("image_path", &params.image_path)?;

        let url = match image_url_for(params.image_path.trim()) {
            Ok(url) => url,
            Err(e) => return Ok(ToolResult::failure(e.to_string())),
        };
        debug!(image = %params.image_path, model = %self.model.model_type(), "Describing image");
        ask_model(
            &self.model,
            vec![Message::user_with_images(DESCRIBE_PROMPT, vec![url])],
        )
        .await
    }
}

struct AskImageTool {
    model: ModelHandle,
}

#[async_trait]
impl Tool for AskImageTool {
    fn name(&self) -> &str {
        "ask_question_about_image"
    }

    fn description(&self) -> &str {
        "Answer a question about an image."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "image_path": {
                    "type": "string",
                    "description": "Local path or url of the image"
                },
                "question": {
                    "type": "string",
                    "description": "Question to answer about the image"
                }
            },
            "required": ["image_path", "question"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let params: AskImageParams = parse_args(args)?;
        require_non_empty("image_path", &params.image_path)?;
        require_non_empty("question", &params.question)?;

        let url = match image_url_for(params.image_path.trim()) {
            Ok(url) => url,
            Err(e) => return Ok(ToolResult::failure(e.to_string())),
        };
        debug!(image = %params.image_path, "Asking question about image");
        ask_model(
            &self.model,
            vec![
                Message::system(QUESTION_SYSTEM_PROMPT),
                Message::user_with_images(params.question, vec![url]),
            ],
        )
        .await
    }
}
