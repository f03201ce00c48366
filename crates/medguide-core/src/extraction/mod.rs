//! Extraction client: prescription photo in, medicine names out.

pub mod parse;

use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use crate::image::PrescriptionImage;
use crate::llm::{ImageInput, LlmProvider, LlmRequest};
use crate::types::{MedicineName, ParseOutcome};
use std::sync::Arc;
use std::time::Duration;

pub use parse::parse_medicine_list;

/// Names read from a prescription, plus any parsing anomalies that were
/// recovered from.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub names: Vec<MedicineName>,
    pub warnings: Vec<String>,
}

/// Reads medicine names off a prescription with a vision-capable LLM.
pub struct ExtractionClient {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
    max_tokens: u32,
    temperature: f32,
}

impl ExtractionClient {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            timeout: Duration::from_millis(config.timeout_ms),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Provider name, for progress messages.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Ordered, deduplicated medicine names on the prescription.
    pub async fn extract(
        &self,
        image: &PrescriptionImage,
    ) -> Result<Vec<MedicineName>, ExtractionError> {
        self.extract_detailed(image).await.map(|e| e.names)
    }

    /// Like [`extract`](Self::extract), but also reports recovered anomalies.
    pub async fn extract_detailed(
        &self,
        image: &PrescriptionImage,
    ) -> Result<Extraction, ExtractionError> {
        if image.is_empty() {
            return Err(ExtractionError::InvalidImage("image is empty".to_string()));
        }
        if !self.provider.is_available().await {
            return Err(ExtractionError::UpstreamUnavailable(format!(
                "{} is not configured",
                self.provider.name()
            )));
        }

        let input = ImageInput::from_bytes(image.bytes(), image.format().as_str());
        let request = LlmRequest::extract_medicines(input, self.max_tokens, self.temperature);

        tracing::debug!(
            provider = self.provider.name(),
            format = %image.format(),
            bytes = image.len(),
            "Sending prescription to vision model"
        );

        let response = match tokio::time::timeout(self.timeout, self.provider.generate(&request))
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!("Extraction call failed: {e}");
                return Err(ExtractionError::UpstreamUnavailable(e.to_string()));
            }
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                tracing::error!("Extraction call timed out after {timeout_ms}ms");
                return Err(ExtractionError::Timeout { timeout_ms });
            }
        };

        tracing::debug!(
            model = %response.model,
            latency_ms = response.latency_ms,
            tokens = ?response.tokens_used,
            "Vision model responded"
        );

        match parse_medicine_list(&response.text) {
            ParseOutcome::Full(names) => Ok(Extraction {
                names,
                warnings: Vec::new(),
            }),
            ParseOutcome::Partial { value, warnings } => {
                for warning in &warnings {
                    tracing::warn!("Extraction response anomaly: {warning}");
                }
                Ok(Extraction {
                    names: value,
                    warnings,
                })
            }
            ParseOutcome::Unparseable(reason) => {
                tracing::error!("Extraction response unusable: {reason}");
                Err(ExtractionError::MalformedResponse(reason))
            }
        }
    }
}
