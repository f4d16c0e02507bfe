//! LLM integration for owl-gaia.
//!
//! Every model handle talks to an OpenAI-compatible chat completion endpoint,
//! either the hosted OpenAI API or a locally served vLLM model.
//!
//! ```ignore
//! use owl_gaia::llm::{ChatClient, GenerationRequest, LlmProvider, Message};
//!
//! let client = ChatClient::new("http://localhost:8964/v1", None, "Qwen/Qwen2.5-VL-7B-Instruct")?;
//! let request = GenerationRequest::new("", vec![Message::user("Hello")]).with_temperature(0.0);
//! let response = client.generate(request).await?;
//! ```

pub mod client;
pub mod scripted;

pub use client::{
    ChatClient, Choice, ContentPart, GenerationRequest, GenerationResponse, ImageUrl,
    LlmProvider, Message, MessageContent, Usage,
};
pub use scripted::ScriptedProvider;
