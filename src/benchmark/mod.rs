//! GAIA benchmark: dataset loading, the per-task run loop and scoring.

pub mod dataset;
pub mod result;
pub mod runner;
pub mod scorer;

pub use dataset::{GaiaDataset, GaiaTask, Subset};
pub use result::{BenchmarkSummary, RunReport, TaskResult};
pub use runner::{build_task_prompt, GaiaBenchmark, LevelFilter, RunRequest};
pub use scorer::{extract_final_answer, question_scorer};
