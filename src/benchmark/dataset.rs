//! GAIA dataset loading.
//!
//! The dataset lives on disk as `<data_dir>/2023/{validation,test}/metadata.jsonl`.
//! Attachments sit next to the metadata file and are referenced by
//! `file_name`; loaded tasks carry the resolved absolute path.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::BenchmarkError;

/// Subset of the benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subset {
    Valid,
    Test,
}

impl Subset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subset::Valid => "valid",
            Subset::Test => "test",
        }
    }

    /// Directory name of the subset under `<data_dir>/2023/`.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Subset::Valid => "validation",
            Subset::Test => "test",
        }
    }
}

impl FromStr for Subset {
    type Err = BenchmarkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "valid" => Ok(Subset::Valid),
            "test" => Ok(Subset::Test),
            other => Err(BenchmarkError::InvalidSubset(other.to_string())),
        }
    }
}

impl std::fmt::Display for Subset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A GAIA task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaiaTask {
    pub task_id: String,
    pub question: String,
    pub level: u8,
    /// Ground truth; `?` on the test subset.
    pub final_answer: String,
    /// Attachment name as given in the metadata.
    pub file_name: Option<String>,
    /// Absolute attachment path.
    pub file_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    task_id: String,
    #[serde(rename = "Question")]
    question: String,
    #[serde(rename = "Level", deserialize_with = "level_from_any")]
    level: u8,
    #[serde(rename = "Final answer", default)]
    final_answer: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
}

/// `Level` appears both as a number and as a string in published metadata.
fn level_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AnyLevel {
        Num(u8),
        Str(String),
    }

    match AnyLevel::deserialize(deserializer)? {
        AnyLevel::Num(n) => Ok(n),
        AnyLevel::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid level '{}'", s))),
    }
}

/// Reads one `metadata.jsonl` file.
pub fn load_metadata(path: &Path) -> Result<Vec<GaiaTask>, BenchmarkError> {
    let content = std::fs::read_to_string(path)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let dir = std::path::absolute(dir)?;

    let mut tasks = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let raw: RawTask = serde_json::from_str(line).map_err(|e| BenchmarkError::DatasetParse {
            path: path.display().to_string(),
            line: index + 1,
            message: e.to_string(),
        })?;

        let file_name = raw.file_name.filter(|f| !f.trim().is_empty());
        let file_path = file_name.as_ref().map(|f| dir.join(f));
        tasks.push(GaiaTask {
            task_id: raw.task_id,
            question: raw.question,
            level: raw.level,
            final_answer: raw.final_answer.unwrap_or_default(),
            file_name,
            file_path,
        });
    }
    Ok(tasks)
}

/// Both subsets of the 2023 release.
#[derive(Debug, Clone, Default)]
pub struct GaiaDataset {
    pub valid: Vec<GaiaTask>,
    pub test: Vec<GaiaTask>,
}

impl GaiaDataset {
    /// Loads `<data_dir>/2023/{validation,test}/metadata.jsonl`.
    ///
    /// The validation metadata is required; a missing test split loads as empty.
    pub fn load(data_dir: &Path) -> Result<Self, BenchmarkError> {
        if !data_dir.is_dir() {
            return Err(BenchmarkError::DatasetNotFound(data_dir.display().to_string()));
        }

        let metadata = |subset: Subset| data_dir.join("2023").join(subset.dir_name()).join("metadata.jsonl");

        let valid_path = metadata(Subset::Valid);
        if !valid_path.is_file() {
            return Err(BenchmarkError::DatasetNotFound(valid_path.display().to_string()));
        }
        let valid = load_metadata(&valid_path)?;

        let test_path = metadata(Subset::Test);
        let test = if test_path.is_file() {
            load_metadata(&test_path)?
        } else {
            warn!(path = %test_path.display(), "Test metadata missing; test subset is empty");
            Vec::new()
        };

        info!(
            data_dir = %data_dir.display(),
            valid = valid.len(),
            test = test.len(),
            "Loaded GAIA dataset"
        );
        Ok(Self { valid, test })
    }

    pub fn subset(&self, subset: Subset) -> &[GaiaTask] {
        match subset {
            Subset::Valid => &self.valid,
            Subset::Test => &self.test,
        }
    }
}
