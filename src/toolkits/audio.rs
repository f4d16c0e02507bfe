//! Audio question answering.
//!
//! The audio file is transcribed through the OpenAI `/audio/transcriptions`
//! endpoint and a chat model answers the question from the transcript.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::{http_client, parse_args, require_non_empty, Tool, ToolContext, ToolError, ToolResult, Toolkit};
use crate::config::Credentials;
use crate::error::ToolkitError;
use crate::llm::{ChatClient, Message};
use crate::models::{ModelConfig, ModelHandle, ModelPlatform, ModelType};
use crate::utils::{extension_of, resolve_local};

const TRANSCRIPTION_MODEL: &str = "whisper-1";

const AUDIO_SYSTEM_PROMPT: &str = "You are an audio analysis assistant. You are given the \
transcript of an audio file. Answer the question strictly from the transcript.";

/// Toolkit exposing `ask_question_about_audio`.
pub struct AudioAnalysisToolkit {
    transcriber: Transcriber,
    model: ModelHandle,
}

impl AudioAnalysisToolkit {
    /// Builds the toolkit against the hosted OpenAI endpoint.
    pub fn new(credentials: &Credentials) -> Result<Self, ToolkitError> {
        let api_key = credentials
            .openai_api_key
            .clone()
            .ok_or_else(|| ToolkitError::MissingCredential {
                toolkit: "audio_analysis".to_string(),
                env_var: "OPENAI_API_KEY".to_string(),
            })?;
        let api_base = credentials.openai_base().trim_end_matches('/').to_string();

        let chat = ChatClient::new(api_base.clone(), Some(api_key.clone()), ModelType::Gpt4o.as_str())
            .map_err(|e| ToolkitError::HttpClient {
                toolkit: "audio_analysis".to_string(),
                reason: e.to_string(),
            })?;
        let model = ModelHandle::new(
            ModelPlatform::OpenAi,
            ModelType::Gpt4o,
            ModelConfig::default(),
            None,
            Arc::new(chat),
        );

        Ok(Self {
            transcriber: Transcriber {
                client: http_client("audio_analysis", 300)?,
                api_base,
                api_key,
            },
            model,
        })
    }

    /// Replaces the answering model.
    pub fn with_model(mut self, model: ModelHandle) -> Self {
        self.model = model;
        self
    }
}

impl Toolkit for AudioAnalysisToolkit {
    fn name(&self) -> &str {
        "audio_analysis"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(AskAudioTool {
            transcriber: self.transcriber.clone(),
            model: self.model.clone(),
        })]
    }
}

#[derive(Clone)]
struct Transcriber {
    client: Client,
    api_base: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

fn audio_mime(ext: &str) -> &'static str {
    match ext {
        "mp3" | "mpga" | "mpeg" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" | "mp4" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}

impl Transcriber {
    async fn transcribe(&self, path: &Path) -> Result<String, ToolError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ToolError::FilesystemError(format!("{}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());
        let ext = extension_of(&file_name).unwrap_or_default();

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(audio_mime(&ext))
            .map_err(|e| ToolError::InvalidParameters(format!("Invalid mime type: {}", e)))?;
        let form = Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .part("file", part);

        let url = format!("{}/audio/transcriptions", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Transcription request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::ExecutionFailed(format!(
                "Transcription returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Invalid transcription response: {}", e)))?;
        Ok(parsed.text)
    }
}

#[derive(Debug, Deserialize)]
struct AskAudioParams {
    audio_path: String,
    question: String,
}

struct AskAudioTool {
    transcriber: Transcriber,
    model: ModelHandle,
}

fn transcript_messages(transcript: &str, question: &str) -> Vec<Message> {
    vec![
        Message::system(AUDIO_SYSTEM_PROMPT),
        Message::user(format!(
            "Transcript:\n{}\n\nQuestion: {}",
            transcript.trim(),
            question.trim()
        )),
    ]
}

#[async_trait]
impl Tool for AskAudioTool {
    fn name(&self) -> &str {
        "ask_question_about_audio"
    }

    fn description(&self) -> &str {
        "Answer a question about an audio file (local path or url) from its transcript."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "audio_path": {
                    "type": "string",
                    "description": "Local path or url of the audio file"
                },
                "question": {
                    "type": "string",
                    "description": "Question about the audio"
                }
            },
            "required": ["audio_path", "question"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let params: AskAudioParams = parse_args(args)?;
        require_non_empty("audio_path", &params.audio_path)?;
        require_non_empty("question", &params.question)?;

        let transcript = match resolve_local(
            &self.transcriber.client,
            params.audio_path.trim(),
            &ctx.working_dir,
        )
        .await
        {
            Ok(path) => match self.transcriber.transcribe(&path).await {
                Ok(text) => text,
                Err(e) => return Ok(ToolResult::failure(e.to_string())),
            },
            Err(e) => return Ok(ToolResult::failure(e.to_string())),
        };
        debug!(chars = transcript.len(), "Audio transcribed");

        let answer = self
            .model
            .complete_text(transcript_messages(&transcript, &params.question))
            .await?;
        Ok(ToolResult::success(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkits::testing::scripted_model;

    #[test]
    fn test_requires_openai_key() {
        let result = AudioAnalysisToolkit::new(&Credentials::default());
        assert!(matches!(
            result,
            Err(ToolkitError::MissingCredential { ref env_var, .. }) if env_var == "OPENAI_API_KEY"
        ));
    }

    #[test]
    fn test_builds_with_key_and_base_override() {
        let mut credentials = Credentials::with_openai_key("sk-test");
        credentials.openai_api_base = Some("http://localhost:9000/v1/".to_string());
        let toolkit = AudioAnalysisToolkit::new(&credentials).expect("toolkit");
        assert_eq!(toolkit.transcriber.api_base, "http://localhost:9000/v1");
        assert_eq!(toolkit.model.model_type(), &ModelType::Gpt4o);

        let tools = toolkit.tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "ask_question_about_audio");
    }

    #[test]
    fn test_audio_mime() {
        assert_eq!(audio_mime("mp3"), "audio/mpeg");
        assert_eq!(audio_mime("wav"), "audio/wav");
        assert_eq!(audio_mime("xyz"), "application/octet-stream");
    }

    #[test]
    fn test_transcript_prompt() {
        let messages = transcript_messages(" hello world \n", "What was said?");
        assert_eq!(messages[0].role, "system");
        assert_eq!(
            messages[1].text(),
            "Transcript:\nhello world\n\nQuestion: What was said?"
        );
    }

    #[tokio::test]
    async fn test_missing_audio_is_failure() {
        let (model, provider) = scripted_model(Vec::<String>::new());
        let toolkit = AudioAnalysisToolkit::new(&Credentials::with_openai_key("sk-test"))
            .expect("toolkit")
            .with_model(model);
        let dir = tempfile::tempdir().expect("tempdir");
        let result = toolkit.tools()[0]
            .execute(
                serde_json::json!({"audio_path": dir.path().join("a.mp3"), "question": "q"}),
                &ToolContext::new(dir.path()),
            )
            .await
            .expect("execute");
        assert!(!result.success);
        assert_eq!(provider.request_count(), 0);
    }
}
