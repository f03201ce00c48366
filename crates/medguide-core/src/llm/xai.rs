//! xAI (Grok) LLM provider (OpenAI-compatible API).
//!
//! xAI serves the same Chat Completions format as OpenAI, including vision
//! input and streaming, so this delegates to `OpenAiProvider` with a custom
//! endpoint.

use super::openai::OpenAiProvider;
use super::provider::{LlmProvider, LlmRequest, LlmResponse, TextStream};
use crate::error::UpstreamResult;
use async_trait::async_trait;
use std::time::Duration;

/// xAI provider wrapping an OpenAI-compatible endpoint.
pub struct XaiProvider {
    inner: OpenAiProvider,
}

impl XaiProvider {
    pub fn new(endpoint: &str, api_key: &str, model: &str) -> Self {
        let url = format!("{}/chat/completions", endpoint.trim_end_matches('/'));
        Self {
            inner: OpenAiProvider::with_endpoint(api_key, model, &url, "xai"),
        }
    }
}

#[async_trait]
impl LlmProvider for XaiProvider {
    fn name(&self) -> &str {
        "xai"
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }

    async fn generate(&self, request: &LlmRequest) -> UpstreamResult<LlmResponse> {
        self.inner.generate(request).await
    }

    async fn generate_stream(&self, request: &LlmRequest) -> UpstreamResult<TextStream> {
        self.inner.generate_stream(request).await
    }

    fn timeout(&self) -> Duration {
        self.inner.timeout()
    }
}
