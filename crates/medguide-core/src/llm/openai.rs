//! OpenAI LLM provider using the Chat Completions API.
//!
//! Sends the prescription image via data URL in the user message content
//! array. Streaming uses `stream: true` server-sent events.

use super::provider::{LlmProvider, LlmRequest, LlmResponse, TextStream};
use super::sse::{self, SseEvent};
use crate::error::{UpstreamError, UpstreamResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// OpenAI provider using Chat Completions API.
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
    endpoint: String,
    label: &'static str,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::with_endpoint(
            api_key,
            model,
            "https://api.openai.com/v1/chat/completions",
            "openai",
        )
    }

    /// Create with a custom endpoint (used by OpenAI-compatible providers).
    pub fn with_endpoint(api_key: &str, model: &str, endpoint: &str, label: &'static str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            label,
        }
    }

    fn build_body(&self, request: &LlmRequest, stream: bool) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: vec![ChatContent::Text {
                    text: system.clone(),
                }],
            });
        }

        let mut content = Vec::with_capacity(2);
        if let Some(image) = &request.image {
            content.push(ChatContent::ImageUrl {
                image_url: ImageUrl {
                    url: image.data_url(),
                    detail: "high".to_string(),
                },
            });
        }
        content.push(ChatContent::Text {
            text: request.prompt.clone(),
        });
        messages.push(ChatMessage {
            role: "user".to_string(),
            content,
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream,
        }
    }

    async fn post(&self, body: &ChatRequest) -> UpstreamResult<reqwest::Response> {
        let label = self.label;
        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .timeout(self.timeout())
            .send()
            .await
            .map_err(|e| UpstreamError::Llm {
                message: format!("{label} request failed: {e}"),
                status_code: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Llm {
                message: format!("{label} HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }
        Ok(resp)
    }
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ChatContent>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
    detail: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: String,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ChunkResponse {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

/// Parse one Chat Completions stream payload.
fn parse_chunk(data: &str) -> UpstreamResult<SseEvent> {
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }
    let chunk: ChunkResponse = serde_json::from_str(data).map_err(|e| UpstreamError::Llm {
        message: format!("Failed to parse stream chunk: {e}"),
        status_code: None,
    })?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .map(SseEvent::Text)
        .unwrap_or(SseEvent::Skip))
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        self.label
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(&self, request: &LlmRequest) -> UpstreamResult<LlmResponse> {
        let start = Instant::now();
        let label = self.label;

        let body = self.build_body(request, false);
        let resp = self.post(&body).await?;

        let chat_resp: ChatResponse = resp.json().await.map_err(|e| UpstreamError::Llm {
            message: format!("Failed to parse {label} response: {e}"),
            status_code: None,
        })?;

        let text = chat_resp
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| UpstreamError::Llm {
                message: format!("{label} returned empty choices array, no content generated"),
                status_code: None,
            })?;

        Ok(LlmResponse {
            text: text.trim().to_string(),
            model: chat_resp.model,
            tokens_used: chat_resp.usage.map(|u| u.total_tokens),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn generate_stream(&self, request: &LlmRequest) -> UpstreamResult<TextStream> {
        let body = self.build_body(request, true);
        let resp = self.post(&body).await?;
        Ok(sse::decode_stream(resp.bytes_stream(), self.label, parse_chunk))
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(120)
    }
}
