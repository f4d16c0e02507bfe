//! Model handle construction.
//!
//! [`ModelFactory::create`] validates credentials and endpoint urls up front
//! so a misconfigured run aborts before any benchmark work starts. No
//! network traffic happens at construction time.

use reqwest::Url;
use std::sync::Arc;
use tracing::{debug, info};

use super::{ModelConfig, ModelHandle, ModelPlatform, ModelType};
use crate::config::{Credentials, RunSettings};
use crate::error::ModelError;
use crate::llm::ChatClient;

/// Builds [`ModelHandle`]s from platform, type and configuration.
pub struct ModelFactory {
    credentials: Credentials,
}

impl ModelFactory {
    /// Create a factory over the given credentials.
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Credentials used by this factory.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Construct a handle.
    ///
    /// # Errors
    ///
    /// - `MissingCredential` for `OpenAi` without `OPENAI_API_KEY`
    /// - `MissingUrl` / `InvalidUrl` for `Vllm` without a usable endpoint
    /// - `InvalidConfig` for out-of-range sampling values
    pub fn create(
        &self,
        platform: ModelPlatform,
        model_type: ModelType,
        config: ModelConfig,
        url: Option<&str>,
    ) -> Result<ModelHandle, ModelError> {
        config.validate()?;

        let (api_base, api_key) = match platform {
            ModelPlatform::OpenAi => {
                let key = self.credentials.openai_api_key.clone().ok_or_else(|| {
                    ModelError::MissingCredential {
                        platform: platform.to_string(),
                        env_var: "OPENAI_API_KEY".to_string(),
                    }
                })?;
                let base = match url {
                    Some(u) => validate_url(u)?,
                    None => self.credentials.openai_base().to_string(),
                };
                (base, Some(key))
            }
            ModelPlatform::Vllm => {
                let u = url.ok_or_else(|| ModelError::MissingUrl(platform.to_string()))?;
                (validate_url(u)?, self.credentials.vllm_api_key.clone())
            }
        };

        debug!(
            platform = %platform,
            model = %model_type,
            api_base = %api_base,
            "Creating model handle"
        );

        let client = ChatClient::new(api_base, api_key, model_type.as_str())?;
        Ok(ModelHandle::new(
            platform,
            model_type,
            config,
            url.map(str::to_string),
            Arc::new(client),
        ))
    }
}

fn validate_url(raw: &str) -> Result<String, ModelError> {
    let parsed = Url::parse(raw).map_err(|e| ModelError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ModelError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    if parsed.host_str().is_none() {
        return Err(ModelError::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// The seven named handles of a benchmark run.
#[derive(Debug, Clone)]
pub struct ModelSet {
    pub user: ModelHandle,
    pub assistant: ModelHandle,
    pub web: ModelHandle,
    pub planning: ModelHandle,
    pub video: ModelHandle,
    pub image: ModelHandle,
    pub search: ModelHandle,
}

impl ModelSet {
    /// Role names in construction order.
    pub const ROLES: [&'static str; 7] = [
        "user",
        "assistant",
        "web",
        "planning",
        "video",
        "image",
        "search",
    ];

    /// Construct every handle in [`Self::ROLES`] order, stopping at the first failure.
    ///
    /// The user handle targets the local vLLM server; the others use GPT-4o
    /// on the hosted OpenAI API. All share temperature 0 and top_p 1.
    pub fn provision(settings: &RunSettings, factory: &ModelFactory) -> Result<Self, ModelError> {
        let config = ModelConfig::chatgpt(0.0, 1.0);
        let vllm_url = settings.vllm_url();
        let hosted = || factory.create(ModelPlatform::OpenAi, ModelType::Gpt4o, config, None);

        let user = factory.create(
            ModelPlatform::Vllm,
            ModelType::from(settings.vllm_model_type.as_str()),
            config,
            Some(&vllm_url),
        )?;

        let set = Self {
            user,
            assistant: hosted()?,
            web: hosted()?,
            planning: hosted()?,
            video: hosted()?,
            image: hosted()?,
            search: hosted()?,
        };

        info!(
            count = set.len(),
            user_model = %set.user.model_type(),
            user_url = %vllm_url,
            "Provisioned model handles"
        );
        Ok(set)
    }

    /// Handles paired with their role names, in construction order.
    pub fn roles(&self) -> Vec<(&'static str, &ModelHandle)> {
        vec![
            ("user", &self.user),
            ("assistant", &self.assistant),
            ("web", &self.web),
            ("planning", &self.planning),
            ("video", &self.video),
            ("image", &self.image),
            ("search", &self.search),
        ]
    }

    /// Look up a handle by role name.
    pub fn get(&self, role: &str) -> Option<&ModelHandle> {
        self.roles()
            .into_iter()
            .find(|(name, _)| *name == role)
            .map(|(_, handle)| handle)
    }

    /// Number of handles (always seven).
    pub fn len(&self) -> usize {
        Self::ROLES.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> ModelFactory {
        ModelFactory::new(Credentials::with_openai_key("sk-test-1234567890"))
    }

    #[test]
    fn test_openai_requires_key() {
        let factory = ModelFactory::new(Credentials::default());
        let err = factory
            .create(
                ModelPlatform::OpenAi,
                ModelType::Gpt4o,
                ModelConfig::chatgpt(0.0, 1.0),
                None,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ModelError::MissingCredential { ref env_var, .. } if env_var == "OPENAI_API_KEY"
        ));
    }

    #[test]
    fn test_vllm_requires_url() {
        let err = factory()
            .create(
                ModelPlatform::Vllm,
                ModelType::from("Qwen/Qwen2.5-VL-7B-Instruct"),
                ModelConfig::chatgpt(0.0, 1.0),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, ModelError::MissingUrl(_)));
    }

    #[test]
    fn test_vllm_rejects_bad_url() {
        for bad in ["not a url", "ftp://localhost:8964/v1"] {
            let err = factory()
                .create(
                    ModelPlatform::Vllm,
                    ModelType::from("m"),
                    ModelConfig::default(),
                    Some(bad),
                )
                .unwrap_err();
            assert!(matches!(err, ModelError::InvalidUrl { .. }), "{}", bad);
        }
    }

    #[test]
    fn test_vllm_does_not_need_openai_key() {
        let factory = ModelFactory::new(Credentials::default());
        let handle = factory
            .create(
                ModelPlatform::Vllm,
                ModelType::from("m"),
                ModelConfig::default(),
                Some("http://localhost:8964/v1"),
            )
            .expect("vllm handle");
        assert_eq!(handle.platform(), ModelPlatform::Vllm);
    }

    #[test]
    fn test_provision_builds_seven_documented_handles() {
        let settings = RunSettings::default();
        let set = ModelSet::provision(&settings, &factory()).expect("provision");
        assert_eq!(set.len(), 7);

        let roles: Vec<&str> = set.roles().iter().map(|(name, _)| *name).collect();
        assert_eq!(roles, ModelSet::ROLES.to_vec());

        assert_eq!(set.user.platform(), ModelPlatform::Vllm);
        assert_eq!(set.user.model_type().as_str(), "Qwen/Qwen2.5-VL-7B-Instruct");
        assert_eq!(set.user.url(), Some("http://localhost:8964/v1"));
        assert_eq!(set.user.config().temperature, Some(0.0));
        assert_eq!(set.user.config().top_p, Some(1.0));

        for (name, handle) in set.roles().into_iter().skip(1) {
            assert_eq!(handle.platform(), ModelPlatform::OpenAi, "{}", name);
            assert_eq!(handle.model_type(), &ModelType::Gpt4o, "{}", name);
            assert_eq!(handle.url(), None, "{}", name);
            assert_eq!(*handle.config(), ModelConfig::chatgpt(0.0, 1.0), "{}", name);
        }

        assert!(!set.web.same_as(&set.planning));
    }

    #[test]
    fn test_provision_follows_configured_port() {
        let settings = RunSettings {
            vllm_port: 9100,
            ..RunSettings::default()
        };
        let set = ModelSet::provision(&settings, &factory()).expect("provision");
        assert_eq!(set.user.url(), Some("http://localhost:9100/v1"));
    }

    #[test]
    fn test_provision_fails_without_openai_key() {
        let factory = ModelFactory::new(Credentials::default());
        let result = ModelSet::provision(&RunSettings::default(), &factory);
        assert!(matches!(result, Err(ModelError::MissingCredential { .. })));
    }

    #[test]
    fn test_get_by_role() {
        let set = ModelSet::provision(&RunSettings::default(), &factory()).expect("provision");
        assert!(set.get("search").is_some_and(|h| h.same_as(&set.search)));
        assert!(set.get("critic").is_none());
    }
}
