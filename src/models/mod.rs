//! Model handles: configured references to language-model endpoints.
//!
//! A [`ModelHandle`] is created once at startup by the [`ModelFactory`] and
//! shared read-only by every toolkit and agent that uses it. Cloning a
//! handle is cheap and never duplicates the underlying HTTP client.

pub mod factory;

pub use factory::{ModelFactory, ModelSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::error::{LlmError, ModelError};
use crate::llm::{GenerationRequest, GenerationResponse, LlmProvider, Message};

/// Platform serving a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelPlatform {
    /// Hosted OpenAI API.
    OpenAi,
    /// Self-hosted vLLM server with an OpenAI-compatible API.
    Vllm,
}

impl ModelPlatform {
    /// Lowercase identifier of the platform.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelPlatform::OpenAi => "openai",
            ModelPlatform::Vllm => "vllm",
        }
    }
}

impl fmt::Display for ModelPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelPlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ModelPlatform::OpenAi),
            "vllm" => Ok(ModelPlatform::Vllm),
            other => Err(format!("Unknown model platform: {}", other)),
        }
    }
}

/// Model identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    Gpt4o,
    Gpt4oMini,
    /// Any other identifier, e.g. a Hugging Face repo served by vLLM.
    Custom(String),
}

impl ModelType {
    /// Identifier sent in the `model` field of requests.
    pub fn as_str(&self) -> &str {
        match self {
            ModelType::Gpt4o => "gpt-4o",
            ModelType::Gpt4oMini => "gpt-4o-mini",
            ModelType::Custom(name) => name,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ModelType {
    fn from(s: &str) -> Self {
        match s {
            "gpt-4o" => ModelType::Gpt4o,
            "gpt-4o-mini" => ModelType::Gpt4oMini,
            other => ModelType::Custom(other.to_string()),
        }
    }
}

/// Sampling configuration attached to a handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ModelConfig {
    /// ChatGPT-style configuration with explicit temperature and top_p.
    pub fn chatgpt(temperature: f64, top_p: f64) -> Self {
        Self {
            temperature: Some(temperature),
            top_p: Some(top_p),
            max_tokens: None,
        }
    }

    /// Set the max tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set fields as a JSON mapping.
    pub fn as_dict(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Checks value ranges accepted by OpenAI-compatible servers.
    pub fn validate(&self) -> Result<(), ModelError> {
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ModelError::InvalidConfig(format!(
                    "temperature {} outside 0.0..=2.0",
                    t
                )));
            }
        }
        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(ModelError::InvalidConfig(format!(
                    "top_p {} outside 0.0..=1.0",
                    p
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(ModelError::InvalidConfig(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

struct HandleInner {
    platform: ModelPlatform,
    model_type: ModelType,
    config: ModelConfig,
    url: Option<String>,
    provider: Arc<dyn LlmProvider>,
}

/// Immutable, shareable reference to a configured model endpoint.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<HandleInner>,
}

impl ModelHandle {
    /// Wrap an already-built provider.
    pub fn new(
        platform: ModelPlatform,
        model_type: ModelType,
        config: ModelConfig,
        url: Option<String>,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                platform,
                model_type,
                config,
                url,
                provider,
            }),
        }
    }

    pub fn platform(&self) -> ModelPlatform {
        self.inner.platform
    }

    pub fn model_type(&self) -> &ModelType {
        &self.inner.model_type
    }

    pub fn config(&self) -> &ModelConfig {
        &self.inner.config
    }

    /// Explicit endpoint url, if the handle was created with one.
    pub fn url(&self) -> Option<&str> {
        self.inner.url.as_deref()
    }

    /// True when both handles share the same underlying endpoint object.
    pub fn same_as(&self, other: &ModelHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Build a request for `messages` with this handle's model and sampling settings.
    pub fn request(&self, messages: Vec<Message>) -> GenerationRequest {
        let mut request = GenerationRequest::new(self.inner.model_type.as_str(), messages);
        request.temperature = self.inner.config.temperature;
        request.top_p = self.inner.config.top_p;
        request.max_tokens = self.inner.config.max_tokens;
        request
    }

    /// Send `messages` and return the full response.
    pub async fn complete(&self, messages: Vec<Message>) -> Result<GenerationResponse, LlmError> {
        self.inner.provider.generate(self.request(messages)).await
    }

    /// Send `messages` and return the text of the first choice.
    pub async fn complete_text(&self, messages: Vec<Message>) -> Result<String, LlmError> {
        let response = self.complete(messages).await?;
        response
            .first_content()
            .ok_or_else(|| LlmError::ParseError("No content in LLM response".to_string()))
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("platform", &self.inner.platform)
            .field("model_type", &self.inner.model_type)
            .field("config", &self.inner.config)
            .field("url", &self.inner.url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedProvider;

    #[test]
    fn test_model_type_round_trip_names() {
        assert_eq!(ModelType::Gpt4o.as_str(), "gpt-4o");
        assert_eq!(ModelType::from("gpt-4o"), ModelType::Gpt4o);
        assert_eq!(
            ModelType::from("Qwen/Qwen2.5-VL-7B-Instruct"),
            ModelType::Custom("Qwen/Qwen2.5-VL-7B-Instruct".to_string())
        );
    }

    #[test]
    fn test_platform_from_str() {
        assert_eq!("OpenAI".parse::<ModelPlatform>(), Ok(ModelPlatform::OpenAi));
        assert_eq!("vllm".parse::<ModelPlatform>(), Ok(ModelPlatform::Vllm));
        assert!("ollama".parse::<ModelPlatform>().is_err());
    }

    #[test]
    fn test_chatgpt_config_as_dict() {
        let dict = ModelConfig::chatgpt(0.0, 1.0).as_dict();
        assert_eq!(dict.get("temperature"), Some(&Value::from(0.0)));
        assert_eq!(dict.get("top_p"), Some(&Value::from(1.0)));
        assert!(!dict.contains_key("max_tokens"));
    }

    #[test]
    fn test_config_validation() {
        assert!(ModelConfig::chatgpt(0.0, 1.0).validate().is_ok());
        assert!(ModelConfig::chatgpt(2.5, 1.0).validate().is_err());
        assert!(ModelConfig::chatgpt(0.0, 1.5).validate().is_err());
        assert!(ModelConfig::default().with_max_tokens(0).validate().is_err());
    }

    #[tokio::test]
    async fn test_handle_applies_config_to_requests() {
        let provider = Arc::new(ScriptedProvider::new(["ok"]));
        let handle = ModelHandle::new(
            ModelPlatform::OpenAi,
            ModelType::Gpt4o,
            ModelConfig::chatgpt(0.0, 1.0),
            None,
            provider.clone(),
        );

        let text = handle
            .complete_text(vec![Message::user("ping")])
            .await
            .expect("scripted reply");
        assert_eq!(text, "ok");

        let sent = provider.requests();
        assert_eq!(sent[0].model, "gpt-4o");
        assert_eq!(sent[0].temperature, Some(0.0));
        assert_eq!(sent[0].top_p, Some(1.0));
        assert_eq!(sent[0].max_tokens, None);
    }

    #[test]
    fn test_clones_share_endpoint() {
        let handle = ModelHandle::new(
            ModelPlatform::Vllm,
            ModelType::Custom("m".into()),
            ModelConfig::default(),
            Some("http://localhost:1/v1".into()),
            Arc::new(ScriptedProvider::default()),
        );
        let copy = handle.clone();
        assert!(handle.same_as(&copy));
        assert_eq!(copy.url(), Some("http://localhost:1/v1"));
    }
}
