//! Run configuration and credentials.
//!
//! `RunSettings` carries every constant of a benchmark run. Its defaults are
//! the canonical run: level 1 of the validation subset, task index 0, the
//! user role served by a local vLLM model and everything else by GPT-4o.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Default vLLM model served for the user role.
pub const DEFAULT_VLLM_MODEL_TYPE: &str = "Qwen/Qwen2.5-VL-7B-Instruct";

/// Default port of the local vLLM server.
pub const DEFAULT_VLLM_PORT: u16 = 8964;

/// Default result file.
pub const DEFAULT_SAVE_TO: &str = "results/result_vllm.json";

/// Default dataset directory.
pub const DEFAULT_DATA_DIR: &str = "data/gaia";

/// Default scratch directory for downloads, frames and generated code.
pub const DEFAULT_CACHE_DIR: &str = "tmp/";

/// Default conversation round limit for a role-playing session.
pub const DEFAULT_ROUND_LIMIT: usize = 15;

/// OpenAI API endpoint used when no override is configured.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Settings for one benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Difficulty level to evaluate (1, 2 or 3).
    pub level: u8,
    /// Whether the per-task results are written to `save_to`.
    pub save_result: bool,
    /// Indices into the level-filtered task list.
    pub test_idx: Vec<usize>,
    /// Model served by the local vLLM endpoint.
    pub vllm_model_type: String,
    /// Port of the local vLLM endpoint.
    pub vllm_port: u16,
    /// Result file path.
    pub save_to: PathBuf,
    /// GAIA dataset directory.
    pub data_dir: PathBuf,
    /// Scratch directory.
    pub cache_dir: PathBuf,
    /// Subset to evaluate ("valid" or "test").
    pub subset: String,
    /// Maximum user/assistant rounds per task.
    pub round_limit: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            level: 1,
            save_result: true,
            test_idx: vec![0],
            vllm_model_type: DEFAULT_VLLM_MODEL_TYPE.to_string(),
            vllm_port: DEFAULT_VLLM_PORT,
            save_to: PathBuf::from(DEFAULT_SAVE_TO),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            subset: "valid".to_string(),
            round_limit: DEFAULT_ROUND_LIMIT,
        }
    }
}

impl RunSettings {
    /// OpenAI-compatible base url of the local vLLM server.
    pub fn vllm_url(&self) -> String {
        format!("http://localhost:{}/v1", self.vllm_port)
    }

    /// Validates the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=3).contains(&self.level) {
            return Err(ConfigError::InvalidValue {
                key: "level".to_string(),
                message: format!("{} is not a GAIA level (1-3)", self.level),
            });
        }
        if self.subset != "valid" && self.subset != "test" {
            return Err(ConfigError::InvalidValue {
                key: "subset".to_string(),
                message: format!("'{}' is neither 'valid' nor 'test'", self.subset),
            });
        }
        if self.round_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "round_limit".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.vllm_model_type.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "vllm_model_type".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// API keys and endpoint overrides read from the environment.
#[derive(Clone, Default, PartialEq)]
pub struct Credentials {
    /// `OPENAI_API_KEY`.
    pub openai_api_key: Option<String>,
    /// `OPENAI_API_BASE_URL`, defaults to the public OpenAI endpoint.
    pub openai_api_base: Option<String>,
    /// `VLLM_API_KEY`; most local servers accept any or no key.
    pub vllm_api_key: Option<String>,
    /// `GOOGLE_API_KEY` for the Custom Search JSON API.
    pub google_api_key: Option<String>,
    /// `SEARCH_ENGINE_ID` for the Custom Search JSON API.
    pub search_engine_id: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &self.openai_api_key.as_deref().map(mask_secret))
            .field("openai_api_base", &self.openai_api_base)
            .field("vllm_api_key", &self.vllm_api_key.as_deref().map(mask_secret))
            .field("google_api_key", &self.google_api_key.as_deref().map(mask_secret))
            .field("search_engine_id", &self.search_engine_id)
            .finish()
    }
}

impl Credentials {
    /// Reads credentials from the process environment.
    ///
    /// Empty values are treated as unset.
    pub fn from_env() -> Self {
        Self {
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            openai_api_base: non_empty_env("OPENAI_API_BASE_URL"),
            vllm_api_key: non_empty_env("VLLM_API_KEY"),
            google_api_key: non_empty_env("GOOGLE_API_KEY"),
            search_engine_id: non_empty_env("SEARCH_ENGINE_ID"),
        }
    }

    /// Credentials with only an OpenAI key set.
    pub fn with_openai_key(key: impl Into<String>) -> Self {
        Self {
            openai_api_key: Some(key.into()),
            ..Self::default()
        }
    }

    /// Base url for the hosted OpenAI API.
    pub fn openai_base(&self) -> &str {
        self.openai_api_base.as_deref().unwrap_or(OPENAI_API_BASE)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Masks a secret for log output.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

/// Creates the scratch directory if it does not exist yet.
pub fn ensure_cache_dir(path: &Path) -> Result<(), ConfigError> {
    std::fs::create_dir_all(path)?;
    Ok(())
}
