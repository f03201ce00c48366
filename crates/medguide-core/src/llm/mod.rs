//! LLM integration for prescription reading and report prose.
//!
//! Provides a provider abstraction over multiple LLM backends (xAI, OpenAI,
//! Anthropic) with single-shot and streaming generation, plus the retry
//! classification shared by every upstream client.

pub(crate) mod anthropic;
pub(crate) mod openai;
pub(crate) mod provider;
pub(crate) mod retry;
pub(crate) mod sse;
pub(crate) mod xai;

pub use provider::{
    resolve_env_var, ImageInput, LlmProvider, LlmProviderFactory, LlmRequest, LlmResponse,
    TextStream,
};
pub use retry::{backoff_duration, is_retryable};
