//! Sequential GAIA benchmark runs.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use super::dataset::{GaiaDataset, GaiaTask, Subset};
use super::result::{BenchmarkSummary, RunReport, TaskResult};
use super::scorer::{extract_final_answer, question_scorer};
use crate::agents::AgentParams;
use crate::config::{DEFAULT_CACHE_DIR, DEFAULT_ROUND_LIMIT};
use crate::error::BenchmarkError;
use crate::society::RolePlaying;
use crate::toolkits::ToolContext;

/// Which difficulty levels a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFilter {
    Level(u8),
    All,
}

impl LevelFilter {
    /// `Level(n)` for n in 1..=3.
    pub fn level(n: u8) -> Result<Self, BenchmarkError> {
        if (1..=3).contains(&n) {
            Ok(LevelFilter::Level(n))
        } else {
            Err(BenchmarkError::InvalidLevel(n))
        }
    }

    pub fn matches(&self, task: &GaiaTask) -> bool {
        match self {
            LevelFilter::Level(n) => task.level == *n,
            LevelFilter::All => true,
        }
    }

    fn as_option(&self) -> Option<u8> {
        match self {
            LevelFilter::Level(n) => Some(*n),
            LevelFilter::All => None,
        }
    }
}

/// Parameters of one call to [`GaiaBenchmark::run`].
pub struct RunRequest {
    /// Subset name, `valid` or `test`.
    pub on: String,
    pub level: LevelFilter,
    /// Indices into the level-filtered task list; empty selects every task.
    pub idx: Vec<usize>,
    pub save_result: bool,
    pub user_role_name: String,
    pub user_params: AgentParams,
    pub assistant_role_name: String,
    pub assistant_params: AgentParams,
    pub round_limit: usize,
}

impl RunRequest {
    /// Validation subset, level 1, first task, results saved.
    pub fn new(user_params: AgentParams, assistant_params: AgentParams) -> Self {
        Self {
            on: Subset::Valid.as_str().to_string(),
            level: LevelFilter::Level(1),
            idx: vec![0],
            save_result: true,
            user_role_name: "user".to_string(),
            user_params,
            assistant_role_name: "assistant".to_string(),
            assistant_params,
            round_limit: DEFAULT_ROUND_LIMIT,
        }
    }
}

/// A loaded GAIA dataset and the file results are written to.
pub struct GaiaBenchmark {
    dataset: GaiaDataset,
    save_to: PathBuf,
    cache_dir: PathBuf,
}

impl GaiaBenchmark {
    pub fn new(data_dir: impl AsRef<Path>, save_to: impl Into<PathBuf>) -> Result<Self, BenchmarkError> {
        let dataset = GaiaDataset::load(data_dir.as_ref())?;
        Ok(Self {
            dataset,
            save_to: save_to.into(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
        })
    }

    /// Directory the assistant's tools work in.
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn valid(&self) -> &[GaiaTask] {
        &self.dataset.valid
    }

    pub fn test(&self) -> &[GaiaTask] {
        &self.dataset.test
    }

    pub fn save_to(&self) -> &Path {
        &self.save_to
    }

    /// Runs the selected tasks and returns the summary.
    pub async fn run(&self, request: RunRequest) -> Result<BenchmarkSummary, BenchmarkError> {
        Ok(self.run_detailed(request).await?.summary)
    }

    /// Runs the selected tasks one after another and returns the full report.
    ///
    /// A failed session is recorded as an incorrect result. Selection errors
    /// and result persistence errors abort the run.
    pub async fn run_detailed(&self, request: RunRequest) -> Result<RunReport, BenchmarkError> {
        let subset: Subset = request.on.parse()?;
        let tasks = self.select(subset, request.level, &request.idx)?;
        info!(
            subset = %subset,
            level = ?request.level,
            tasks = tasks.len(),
            "Starting GAIA run"
        );

        let started_at = Utc::now();
        let mut results = Vec::with_capacity(tasks.len());
        for (position, task) in tasks.into_iter().enumerate() {
            info!(position, task_id = %task.task_id, level = task.level, "Running task");
            let result = self.run_task(task, &request).await;
            info!(
                task_id = %result.task_id,
                answer = %result.model_answer,
                ground_truth = %result.ground_truth,
                correct = result.score,
                "Task finished"
            );
            results.push(result);
        }

        let report = RunReport::new(subset, request.level.as_option(), started_at, results);
        if request.save_result {
            report.save(&self.save_to)?;
            info!(path = %self.save_to.display(), "Saved results");
        }
        Ok(report)
    }

    fn select(&self, subset: Subset, level: LevelFilter, idx: &[usize]) -> Result<Vec<&GaiaTask>, BenchmarkError> {
        let filtered: Vec<&GaiaTask> = self
            .dataset
            .subset(subset)
            .iter()
            .filter(|t| level.matches(t))
            .collect();

        if idx.is_empty() {
            return Ok(filtered);
        }
        idx.iter()
            .map(|&index| {
                filtered.get(index).copied().ok_or(BenchmarkError::IndexOutOfRange {
                    index,
                    len: filtered.len(),
                })
            })
            .collect()
    }

    async fn run_task(&self, task: &GaiaTask, request: &RunRequest) -> TaskResult {
        let started = Instant::now();
        let session = RolePlaying::new(
            build_task_prompt(task),
            &request.user_role_name,
            request.user_params.clone(),
            &request.assistant_role_name,
            request.assistant_params.clone(),
            request.round_limit,
        )
        .with_context(ToolContext::new(&self.cache_dir));

        match session.run().await {
            Ok(outcome) => {
                let answer = extract_final_answer(&outcome.final_response);
                let score = question_scorer(&answer, &task.final_answer);
                TaskResult::scored(task, outcome, answer, score, started.elapsed())
            }
            Err(e) => {
                warn!(task_id = %task.task_id, error = %e, "Session failed; recording as incorrect");
                TaskResult::failed(task, e.to_string(), started.elapsed())
            }
        }
    }
}

/// Task text handed to the society.
pub fn build_task_prompt(task: &GaiaTask) -> String {
    let mut prompt = task.question.trim().to_string();
    if let Some(path) = &task.file_path {
        prompt.push_str(&format!(
            "\n\nHere are the necessary files: {}. Use the tools to read or analyse them.",
            path.display()
        ));
    }
    prompt.push_str(
        "\n\nYour final answer should be a number OR as few words as possible OR a comma separated \
list of numbers and/or strings. If you are asked for a number, don't use commas to write your \
number nor units such as $ or percent sign unless specified otherwise. If you are asked for a \
string, don't use articles nor abbreviations (e.g. for cities), and write digits in plain text \
unless specified otherwise. If you are asked for a comma separated list, apply the above rules \
to each element.",
    );
    prompt
}
