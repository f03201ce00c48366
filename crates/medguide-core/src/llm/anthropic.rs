//! Anthropic LLM provider using the Messages API.
//!
//! Sends image + prompt with base64 image content blocks. Streaming reads
//! `content_block_delta` events.

use super::provider::{LlmProvider, LlmRequest, LlmResponse, TextStream};
use super::sse::{self, SseEvent};
use crate::error::{UpstreamError, UpstreamResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic provider using the Messages API.
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn build_body(&self, request: &LlmRequest, stream: bool) -> MessagesRequest {
        let mut content = Vec::with_capacity(2);
        if let Some(image) = &request.image {
            content.push(ContentBlock::Image {
                source: ImageSource {
                    source_type: "base64".to_string(),
                    media_type: image.media_type.clone(),
                    data: image.data.clone(),
                },
            });
        }
        content.push(ContentBlock::Text {
            text: request.prompt.clone(),
        });

        MessagesRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            system: request.system.clone(),
            temperature: Some(request.temperature),
            messages: vec![Message {
                role: "user".to_string(),
                content,
            }],
            stream,
        }
    }

    async fn post(&self, body: &MessagesRequest) -> UpstreamResult<reqwest::Response> {
        let resp = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(body)
            .timeout(self.timeout())
            .send()
            .await
            .map_err(|e| UpstreamError::Llm {
                message: format!("Anthropic request failed: {e}"),
                status_code: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Llm {
                message: format!("Anthropic HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }
        Ok(resp)
    }
}

// --- Request types ---

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "image")]
    Image { source: ImageSource },
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseContent>,
    model: String,
    usage: Usage,
}

#[derive(Deserialize)]
struct ResponseContent {
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    delta: Option<StreamDelta>,
    error: Option<StreamError>,
}

#[derive(Deserialize)]
struct StreamDelta {
    text: Option<String>,
}

#[derive(Deserialize)]
struct StreamError {
    message: String,
}

/// Parse one Messages API stream payload.
fn parse_event(data: &str) -> UpstreamResult<SseEvent> {
    let event: StreamEvent = serde_json::from_str(data).map_err(|e| UpstreamError::Llm {
        message: format!("Failed to parse Anthropic stream event: {e}"),
        status_code: None,
    })?;
    match event.event_type.as_str() {
        "content_block_delta" => Ok(event
            .delta
            .and_then(|d| d.text)
            .map(SseEvent::Text)
            .unwrap_or(SseEvent::Skip)),
        "message_stop" => Ok(SseEvent::Done),
        "error" => Err(UpstreamError::Llm {
            message: event
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "Anthropic stream error".to_string()),
            status_code: None,
        }),
        _ => Ok(SseEvent::Skip),
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(&self, request: &LlmRequest) -> UpstreamResult<LlmResponse> {
        let start = Instant::now();

        let body = self.build_body(request, false);
        let resp = self.post(&body).await?;

        let messages_resp: MessagesResponse =
            resp.json().await.map_err(|e| UpstreamError::Llm {
                message: format!("Failed to parse Anthropic response: {e}"),
                status_code: None,
            })?;

        let text = messages_resp
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(UpstreamError::Llm {
                message: "Anthropic returned empty response, no text content generated"
                    .to_string(),
                status_code: None,
            });
        }

        Ok(LlmResponse {
            text,
            model: messages_resp.model,
            tokens_used: Some(messages_resp.usage.input_tokens + messages_resp.usage.output_tokens),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn generate_stream(&self, request: &LlmRequest) -> UpstreamResult<TextStream> {
        let body = self.build_body(request, true);
        let resp = self.post(&body).await?;
        Ok(sse::decode_stream(resp.bytes_stream(), "anthropic", parse_event))
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(120)
    }
}
