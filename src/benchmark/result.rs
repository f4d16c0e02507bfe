//! Per-task results and the saved run report.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dataset::{GaiaTask, Subset};
use crate::error::BenchmarkError;
use crate::society::{ChatTurn, SocietyOutcome};

/// Outcome of one GAIA task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub question: String,
    pub level: u8,
    pub ground_truth: String,
    /// Answer extracted from the assistant's closing reply.
    pub model_answer: String,
    pub score: bool,
    /// Set when the session failed before producing an answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub rounds: usize,
    pub tool_calls: usize,
    pub total_tokens: u32,
    pub duration: Duration,
    pub history: Vec<ChatTurn>,
    pub finished_at: DateTime<Utc>,
}

impl TaskResult {
    /// A scored result from a finished session.
    pub fn scored(
        task: &GaiaTask,
        outcome: SocietyOutcome,
        model_answer: String,
        score: bool,
        duration: Duration,
    ) -> Self {
        Self {
            task_id: task.task_id.clone(),
            question: task.question.clone(),
            level: task.level,
            ground_truth: task.final_answer.clone(),
            model_answer,
            score,
            error: None,
            rounds: outcome.rounds(),
            tool_calls: outcome.tool_call_count(),
            total_tokens: outcome.usage.total_tokens,
            duration,
            history: outcome.history,
            finished_at: Utc::now(),
        }
    }

    /// An incorrect result for a session that failed.
    pub fn failed(task: &GaiaTask, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            task_id: task.task_id.clone(),
            question: task.question.clone(),
            level: task.level,
            ground_truth: task.final_answer.clone(),
            model_answer: String::new(),
            score: false,
            error: Some(error.into()),
            rounds: 0,
            tool_calls: 0,
            total_tokens: 0,
            duration,
            history: Vec::new(),
            finished_at: Utc::now(),
        }
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    pub correct: usize,
    pub total: usize,
    pub accuracy: f64,
}

impl BenchmarkSummary {
    pub fn from_results(results: &[TaskResult]) -> Self {
        let total = results.len();
        let correct = results.iter().filter(|r| r.score).count();
        let accuracy = if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64
        };
        Self {
            correct,
            total,
            accuracy,
        }
    }
}

/// Everything written to the result file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub subset: Subset,
    /// Level filter, `None` for all levels.
    pub level: Option<u8>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: BenchmarkSummary,
    pub results: Vec<TaskResult>,
}

impl RunReport {
    pub fn new(subset: Subset, level: Option<u8>, started_at: DateTime<Utc>, results: Vec<TaskResult>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            subset,
            level,
            started_at,
            finished_at: Utc::now(),
            summary: BenchmarkSummary::from_results(&results),
            results,
        }
    }

    /// Writes the report as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), BenchmarkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, BenchmarkError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
