//! LLM provider trait and request/response types.
//!
//! Defines the interface that all LLM providers implement, plus the
//! factory that creates the right provider from config.

use crate::config::LlmConfig;
use crate::error::{UpstreamError, UpstreamResult};
use crate::types::MedicineRecord;
use async_trait::async_trait;
use base64::Engine;
use futures_util::Stream;
use std::pin::Pin;
use std::time::Duration;

/// Upper bound on scraped text forwarded to a summary prompt.
const MAX_CONTEXT_CHARS: usize = 4000;

/// Base64-encoded image ready to send to an LLM API.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub media_type: String,
}

impl ImageInput {
    /// Create an `ImageInput` from raw bytes and format string.
    ///
    /// The format is the image format identifier (e.g., "jpeg", "png", "webp").
    pub fn from_bytes(bytes: &[u8], format: &str) -> Self {
        let media_type = match format {
            "jpeg" | "jpg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            other => {
                tracing::warn!("Unknown image format '{other}', defaulting to image/jpeg");
                "image/jpeg"
            }
        };

        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type: media_type.to_string(),
        }
    }

    /// Return a data URL suitable for OpenAI-style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// A request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// System instruction, if any
    pub system: Option<String>,
    /// User prompt
    pub prompt: String,
    /// Image attached to the user turn
    pub image: Option<ImageInput>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl LlmRequest {
    /// Build the request that reads medicine names off a prescription photo.
    pub fn extract_medicines(image: ImageInput, max_tokens: u32, temperature: f32) -> Self {
        Self {
            system: Some(
                "You are a pharmacy assistant that reads handwritten and printed \
                 prescriptions. Identify every medicine named on the prescription. \
                 Report brand or generic names exactly as written, including strength \
                 when it is part of the name. Ignore doctor names, patient details, \
                 diagnoses and dosing instructions."
                    .to_string(),
            ),
            prompt: "List all medicine names on this prescription. Respond with JSON only, \
                     in the form {\"medicines\": [\"name\", ...]}. If there are none, \
                     respond with {\"medicines\": []}."
                .to_string(),
            image: Some(image),
            max_tokens,
            temperature,
        }
    }

    /// Build the request that writes the prose part of one report block.
    pub fn summarize_medicine(record: &MedicineRecord, max_tokens: u32) -> Self {
        let mut context = format!("Medicine: {}\n", record.name);
        if !record.description.is_empty() {
            context.push_str(&format!("Description: {}\n", record.description));
        }
        if !record.dosage.is_empty() {
            context.push_str(&format!("Dosage notes: {}\n", record.dosage));
        }
        if !record.details.is_empty() {
            let excerpt: String = record.details.chars().take(MAX_CONTEXT_CHARS).collect();
            context.push_str("\nSource excerpt:\n");
            context.push_str(&excerpt);
            context.push('\n');
        }

        Self {
            system: Some(
                "You write concise, factual medicine summaries for patients. Use only \
                 the information provided. Never invent prices, dosages or links."
                    .to_string(),
            ),
            prompt: format!(
                "{context}\nWrite two short markdown paragraphs for this medicine, each \
                 starting with a bold label: **Description:** what it is and what it is \
                 used for, and **Typical Duration:** how long it is usually taken. \
                 Do not add headings."
            ),
            image: None,
            max_tokens,
            temperature: 0.3,
        }
    }
}

/// The response from a single-shot LLM call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated text
    pub text: String,
    /// Model identifier used
    pub model: String,
    /// Number of tokens used (input + output), if reported
    pub tokens_used: Option<u32>,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

/// Incrementally generated text. Each item is the next chunk.
pub type TextStream = Pin<Box<dyn Stream<Item = UpstreamResult<String>> + Send>>;

/// Trait that all LLM providers implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (we need `Arc<dyn LlmProvider>` for dynamic dispatch).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging (e.g., "xai", "anthropic").
    fn name(&self) -> &str;

    /// Check whether the provider is configured.
    async fn is_available(&self) -> bool;

    /// Generate a complete response for the given request.
    async fn generate(&self, request: &LlmRequest) -> UpstreamResult<LlmResponse>;

    /// Generate a response incrementally.
    ///
    /// Providers without a streaming endpoint yield the whole response as a
    /// single chunk.
    async fn generate_stream(&self, request: &LlmRequest) -> UpstreamResult<TextStream> {
        let response = self.generate(request).await?;
        Ok(Box::pin(futures_util::stream::iter(vec![Ok(response.text)])))
    }

    /// Per-request timeout for this provider.
    fn timeout(&self) -> Duration;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Factory that creates the appropriate provider from config.
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create an LLM provider based on provider name, config, and optional model override.
    ///
    /// # Arguments
    /// * `provider` - Provider identifier ("xai", "openai", "anthropic")
    /// * `config` - The full LLM config section
    /// * `model_override` - Optional model name that overrides the config default
    pub fn create(
        provider: &str,
        config: &LlmConfig,
        model_override: Option<&str>,
    ) -> UpstreamResult<Box<dyn LlmProvider>> {
        let model_override = model_override.filter(|m| !m.is_empty());
        match provider {
            "xai" => {
                let cfg = config.xai.clone().unwrap_or_default();
                let api_key = resolve_env_var(&cfg.api_key).ok_or_else(|| {
                    UpstreamError::NotConfigured(
                        "xAI API key not set. Set XAI_API_KEY env var.".to_string(),
                    )
                })?;
                let model = model_override.map(String::from).unwrap_or(cfg.model);
                Ok(Box::new(super::xai::XaiProvider::new(
                    &cfg.endpoint,
                    &api_key,
                    &model,
                )))
            }
            "anthropic" => {
                let cfg = config.anthropic.clone().unwrap_or_default();
                let api_key = resolve_env_var(&cfg.api_key).ok_or_else(|| {
                    UpstreamError::NotConfigured(
                        "Anthropic API key not set. Set ANTHROPIC_API_KEY env var.".to_string(),
                    )
                })?;
                let model = model_override.map(String::from).unwrap_or(cfg.model);
                Ok(Box::new(super::anthropic::AnthropicProvider::new(
                    &api_key, &model,
                )))
            }
            "openai" => {
                let cfg = config.openai.clone().unwrap_or_default();
                let api_key = resolve_env_var(&cfg.api_key).ok_or_else(|| {
                    UpstreamError::NotConfigured(
                        "OpenAI API key not set. Set OPENAI_API_KEY env var.".to_string(),
                    )
                })?;
                let model = model_override.map(String::from).unwrap_or(cfg.model);
                Ok(Box::new(super::openai::OpenAiProvider::new(
                    &api_key, &model,
                )))
            }
            other => Err(UpstreamError::NotConfigured(format!(
                "Unknown LLM provider: {other}"
            ))),
        }
    }
}
