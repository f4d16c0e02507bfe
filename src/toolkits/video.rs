//! Video question answering.
//!
//! Frames are sampled with `ffmpeg` into a temporary directory under the
//! scratch dir, a bounded, evenly spaced subset is inlined as base64 images
//! and sent to the video model together with the question. Page urls that
//! are not direct video files (for example YouTube links) are fetched with
//! `yt-dlp` first.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::image::image_data_url;
use super::{http_client, parse_args, require_non_empty, Tool, ToolContext, ToolError, ToolResult, Toolkit};
use crate::error::ToolkitError;
use crate::llm::Message;
use crate::models::ModelHandle;
use crate::utils::{cache_file_name, extension_of, is_url, resolve_local};

/// Frames sent to the model per question.
const MAX_FRAMES: usize = 16;

/// Seconds between sampled frames.
const SAMPLE_INTERVAL_SECS: u32 = 2;

/// Subprocess timeout for ffmpeg and yt-dlp.
const MEDIA_TIMEOUT_SECS: u64 = 600;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "webm", "avi", "m4v"];

const VIDEO_PROMPT: &str = "The images are frames sampled in order from a video, \
roughly {interval} seconds apart. Use them to answer the question. \
If the frames do not show enough to answer, say what is visible instead.\n\nQuestion: {question}";

/// Toolkit exposing `ask_question_about_video`.
pub struct VideoAnalysisToolkit {
    model: ModelHandle,
    client: Client,
}

impl VideoAnalysisToolkit {
    pub fn new(model: ModelHandle) -> Result<Self, ToolkitError> {
        Ok(Self {
            model,
            client: http_client("video_analysis", MEDIA_TIMEOUT_SECS)?,
        })
    }
}

impl Toolkit for VideoAnalysisToolkit {
    fn name(&self) -> &str {
        "video_analysis"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(AskVideoTool {
            model: self.model.clone(),
            client: self.client.clone(),
        })]
    }
}

#[derive(Debug, Deserialize)]
struct AskVideoParams {
    video_path: String,
    question: String,
}

struct AskVideoTool {
    model: ModelHandle,
    client: Client,
}

impl AskVideoTool {
    async fn local_video(&self, source: &str, cache_dir: &Path) -> Result<PathBuf, ToolError> {
        let direct = extension_of(source)
            .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false);
        if !is_url(source) || direct {
            return resolve_local(&self.client, source, cache_dir).await;
        }

        let target = cache_dir.join(format!("{}.mp4", cache_file_name(source)));
        if target.exists() {
            return Ok(target);
        }
        info!(url = source, "Downloading video with yt-dlp");
        let mut cmd = Command::new("yt-dlp");
        cmd.args(["-f", "mp4/best", "--quiet", "-o"])
            .arg(&target)
            .arg(source);
        run_media_command(cmd, "yt-dlp").await?;
        Ok(target)
    }

    async fn ask(&self, params: &AskVideoParams, ctx: &ToolContext) -> Result<String, ToolError> {
        let video = self.local_video(params.video_path.trim(), &ctx.working_dir).await?;

        tokio::fs::create_dir_all(&ctx.working_dir)
            .await
            .map_err(|e| ToolError::FilesystemError(e.to_string()))?;
        let frames_dir = tempfile::Builder::new()
            .prefix("frames_")
            .tempdir_in(&ctx.working_dir)
            .map_err(|e| ToolError::FilesystemError(format!("Failed to create frame dir: {}", e)))?;

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(&video)
            .args(["-vf", &format!("fps=1/{},scale=512:-2", SAMPLE_INTERVAL_SECS)])
            .arg(frames_dir.path().join("frame_%05d.jpg"));
        run_media_command(cmd, "ffmpeg").await?;

        let frames = select_evenly(list_frames(frames_dir.path()), MAX_FRAMES);
        if frames.is_empty() {
            return Err(ToolError::ExecutionFailed(format!(
                "No frames could be extracted from {}",
                video.display()
            )));
        }
        debug!(video = %video.display(), frames = frames.len(), "Sending sampled frames");

        let images = frames
            .iter()
            .map(|f| image_data_url(f))
            .collect::<Result<Vec<_>, _>>()?;
        let prompt = VIDEO_PROMPT
            .replace("{interval}", &SAMPLE_INTERVAL_SECS.to_string())
            .replace("{question}", params.question.trim());

        Ok(self
            .model
            .complete_text(vec![Message::user_with_images(prompt, images)])
            .await?)
    }
}

async fn run_media_command(mut cmd: Command, program: &str) -> Result<(), ToolError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let child = cmd
        .spawn()
        .map_err(|e| ToolError::NotAvailable(format!("{} is required: {}", program, e)))?;

    let output = tokio::time::timeout(Duration::from_secs(MEDIA_TIMEOUT_SECS), child.wait_with_output())
        .await
        .map_err(|_| ToolError::Timeout {
            seconds: MEDIA_TIMEOUT_SECS,
        })?
        .map_err(|e| ToolError::ExecutionFailed(format!("{} failed: {}", program, e)))?;

    if !output.status.success() {
        return Err(ToolError::ExecutionFailed(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

/// Extracted frame images in name order.
fn list_frames(dir: &Path) -> Vec<PathBuf> {
    let mut frames: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "jpg"))
        .collect();
    frames.sort();
    frames
}

/// At most `max` items, evenly spaced, always keeping the first.
fn select_evenly<T: Clone>(items: Vec<T>, max: usize) -> Vec<T> {
    if items.len() <= max || max == 0 {
        return if max == 0 { Vec::new() } else { items };
    }
    let step = items.len() as f64 / max as f64;
    (0..max)
        .map(|i| items[(i as f64 * step) as usize].clone())
        .collect()
}

#[async_trait]
impl Tool for AskVideoTool {
    fn name(&self) -> &str {
        "ask_question_about_video"
    }

    fn description(&self) -> &str {
        "Answer a question about a video file or video url by inspecting sampled frames."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "video_path": {
                    "type": "string",
                    "description": "Local path or url of the video"
                },
                "question": {
                    "type": "string",
                    "description": "Question about the video"
                }
            },
            "required": ["video_path", "question"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let params: AskVideoParams = parse_args(args)?;
        require_non_empty("video_path", &params.video_path)?;
        require_non_empty("question", &params.question)?;

        match self.ask(&params, ctx).await {
            Ok(answer) => Ok(ToolResult::success(answer)),
            Err(ToolError::Model(e)) => Err(ToolError::Model(e)),
            Err(e) => Ok(ToolResult::failure(e.to_string())),
        }
    }
}
