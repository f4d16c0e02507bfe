//! CLI definition and the benchmark run it drives.
//!
//! Invoked without flags the binary performs the canonical run: level 1 of
//! the validation subset, task index 0, results saved to
//! `results/result_vllm.json`.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use crate::agents::AgentParams;
use crate::benchmark::{GaiaBenchmark, LevelFilter, RunRequest};
use crate::config::{
    ensure_cache_dir, Credentials, RunSettings, DEFAULT_CACHE_DIR, DEFAULT_DATA_DIR,
    DEFAULT_ROUND_LIMIT, DEFAULT_SAVE_TO, DEFAULT_VLLM_MODEL_TYPE, DEFAULT_VLLM_PORT,
};
use crate::error::ToolkitError;
use crate::models::{ModelFactory, ModelSet};
use crate::toolkits::{
    AudioAnalysisToolkit, CodeExecutionToolkit, DocumentProcessingToolkit, ExcelToolkit,
    ImageAnalysisToolkit, Sandbox, SearchToolkit, ToolSet, Toolkit, VideoAnalysisToolkit,
    WebToolkit,
};

/// Role name of the instructing agent.
const USER_ROLE_NAME: &str = "user";

/// Role name of the solving agent.
const ASSISTANT_ROLE_NAME: &str = "assistant";

/// Run GAIA with a role-playing user/assistant society.
#[derive(Parser, Debug)]
#[command(name = "owl-gaia")]
#[command(about = "Evaluate a role-playing agent society on the GAIA benchmark")]
#[command(version)]
#[command(
    long_about = "owl-gaia runs GAIA tasks through a user agent served by a local vLLM model and a tool-using GPT-4o assistant.\n\nExample usage:\n  owl-gaia --level 2 --test-idx 0,1,2 --save-to results/level2.json"
)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// GAIA difficulty level (1, 2 or 3).
    #[arg(long, default_value_t = 1)]
    pub level: u8,

    /// Comma-separated task indices within the level; pass an empty value for all tasks.
    #[arg(long, value_delimiter = ',', default_value = "0")]
    pub test_idx: Vec<usize>,

    /// Write per-task results to --save-to.
    #[arg(long, default_value = "true", action = clap::ArgAction::Set)]
    pub save_result: bool,

    /// Subset to evaluate (valid or test).
    #[arg(long, default_value = "valid")]
    pub subset: String,

    /// Model served by the local vLLM endpoint for the user role.
    #[arg(long, env = "VLLM_MODEL_TYPE", default_value = DEFAULT_VLLM_MODEL_TYPE)]
    pub vllm_model_type: String,

    /// Port of the local vLLM endpoint.
    #[arg(long, env = "VLLM_PORT", default_value_t = DEFAULT_VLLM_PORT)]
    pub vllm_port: u16,

    /// Result file.
    #[arg(long, default_value = DEFAULT_SAVE_TO)]
    pub save_to: PathBuf,

    /// GAIA dataset directory.
    #[arg(long, env = "GAIA_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Scratch directory for downloads, frames and generated code.
    #[arg(long, default_value = DEFAULT_CACHE_DIR)]
    pub cache_dir: PathBuf,

    /// Maximum user/assistant rounds per task.
    #[arg(long, default_value_t = DEFAULT_ROUND_LIMIT)]
    pub round_limit: usize,
}

impl Cli {
    /// Settings for this invocation.
    pub fn settings(&self) -> RunSettings {
        RunSettings {
            level: self.level,
            save_result: self.save_result,
            test_idx: self.test_idx.clone(),
            vllm_model_type: self.vllm_model_type.clone(),
            vllm_port: self.vllm_port,
            save_to: self.save_to.clone(),
            data_dir: self.data_dir.clone(),
            cache_dir: self.cache_dir.clone(),
            subset: self.subset.clone(),
            round_limit: self.round_limit,
        }
    }
}

/// Parse CLI arguments, after loading `.env` so env-backed flags see it.
pub fn parse_cli() -> Cli {
    dotenvy::dotenv().ok();
    Cli::parse()
}

/// Parse CLI arguments and run.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the benchmark with the parsed arguments.
///
/// Models and toolkits are all constructed before the dataset is touched;
/// the first failure aborts the run.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Existing variables win over `.env`, so a second load is harmless.
    dotenvy::dotenv().ok();

    let settings = cli.settings();
    settings.validate().context("Invalid run settings")?;
    ensure_cache_dir(&settings.cache_dir)
        .with_context(|| format!("Failed to create cache dir '{}'", settings.cache_dir.display()))?;

    let credentials = Credentials::from_env();
    let factory = ModelFactory::new(credentials.clone());
    let models = ModelSet::provision(&settings, &factory).context("Failed to provision models")?;

    let tools = assemble_tools(&models, &credentials).context("Failed to assemble toolkits")?;
    info!(tools = tools.len(), names = ?tools.names(), "Assembled tools");
    let (user_params, assistant_params) = build_agent_params(&models, tools);

    let benchmark = GaiaBenchmark::new(&settings.data_dir, settings.save_to.clone())
        .context("Failed to load GAIA dataset")?
        .with_cache_dir(settings.cache_dir.clone());

    println!("Number of validation examples: {}", benchmark.valid().len());
    println!("Number of test examples: {}", benchmark.test().len());

    let request = RunRequest {
        on: settings.subset.clone(),
        level: LevelFilter::level(settings.level)?,
        idx: settings.test_idx.clone(),
        save_result: settings.save_result,
        user_role_name: USER_ROLE_NAME.to_string(),
        user_params,
        assistant_role_name: ASSISTANT_ROLE_NAME.to_string(),
        assistant_params,
        round_limit: settings.round_limit,
    };
    let summary = benchmark.run(request).await.context("Benchmark run failed")?;

    let counts = format!("Correct: {}, Total: {}", summary.correct, summary.total);
    let accuracy = format!("Accuracy: {}", summary.accuracy);
    println!("{}", counts);
    println!("{}", accuracy);
    info!(outcome = "success", correct = summary.correct, total = summary.total, "{}", counts);
    info!(outcome = "success", accuracy = summary.accuracy, "{}", accuracy);
    Ok(())
}

/// The assistant's tools, toolkit by toolkit in run order.
pub fn assemble_tools(models: &ModelSet, credentials: &Credentials) -> Result<ToolSet, ToolkitError> {
    let toolkits: Vec<Box<dyn Toolkit>> = vec![
        Box::new(WebToolkit::new(true, models.web.clone(), models.planning.clone())?),
        Box::new(DocumentProcessingToolkit::new()?),
        Box::new(VideoAnalysisToolkit::new(models.video.clone())?),
        Box::new(AudioAnalysisToolkit::new(credentials)?),
        Box::new(CodeExecutionToolkit::new(Sandbox::Subprocess, true)),
        Box::new(ImageAnalysisToolkit::new(models.image.clone())),
        Box::new(SearchToolkit::new(models.search.clone(), credentials)?),
        Box::new(ExcelToolkit::new()),
    ];

    let mut tools = ToolSet::new();
    for toolkit in &toolkits {
        tools.extend_from(toolkit.as_ref());
    }
    Ok(tools)
}

/// Parameter bundles for the user and assistant agents.
pub fn build_agent_params(models: &ModelSet, tools: ToolSet) -> (AgentParams, AgentParams) {
    (
        AgentParams::user(models.user.clone()),
        AgentParams::assistant(models.assistant.clone(), tools),
    )
}
