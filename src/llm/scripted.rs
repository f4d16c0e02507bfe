//! Scripted provider that replays canned completions.
//!
//! Used to drive agents, role-playing sessions and the benchmark loop without
//! a live endpoint. Every request is recorded for later inspection.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::client::{
    Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage,
};
use crate::error::LlmError;

/// Provider returning queued responses in order.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<GenerationRequest>>,
    fallback: Option<String>,
}

impl ScriptedProvider {
    /// Create a provider that replays `responses` in order.
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
            fallback: None,
        }
    }

    /// Reply with `text` once the queue is drained instead of failing.
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let model = request.model.clone();
        let index = {
            let mut requests = self
                .requests
                .lock()
                .map_err(|e| LlmError::RequestFailed(e.to_string()))?;
            requests.push(request);
            requests.len() - 1
        };

        let next = self
            .responses
            .lock()
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?
            .pop_front();

        let text = match (next, &self.fallback) {
            (Some(text), _) => text,
            (None, Some(fallback)) => fallback.clone(),
            (None, None) => return Err(LlmError::ScriptExhausted(index)),
        };

        let completion_tokens = text.split_whitespace().count() as u32;
        Ok(GenerationResponse {
            id: format!("scripted-{}", index),
            model,
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(text),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage {
                prompt_tokens: 1,
                completion_tokens,
                total_tokens: completion_tokens + 1,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_then_exhausts() {
        let provider = ScriptedProvider::new(["first", "second"]);
        let req = || GenerationRequest::new("m", vec![Message::user("hi")]);

        let a = provider.generate(req()).await.expect("first");
        let b = provider.generate(req()).await.expect("second");
        assert_eq!(a.first_content().as_deref(), Some("first"));
        assert_eq!(b.first_content().as_deref(), Some("second"));

        let err = provider.generate(req()).await.unwrap_err();
        assert!(matches!(err, LlmError::ScriptExhausted(2)));
        assert_eq!(provider.request_count(), 3);
    }

    #[tokio::test]
    async fn test_fallback_after_queue() {
        let provider = ScriptedProvider::new(Vec::<String>::new()).with_fallback("again");
        let response = provider
            .generate(GenerationRequest::new("m", vec![]))
            .await
            .expect("fallback response");
        assert_eq!(response.first_content().as_deref(), Some("again"));
    }
}
