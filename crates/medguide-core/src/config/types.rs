//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};

/// Prescription extraction (vision model) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// LLM provider used for reading the prescription ("xai", "openai", "anthropic")
    pub provider: String,

    /// Model name; empty means the provider's configured default
    pub model: String,

    /// Maximum tokens the model may generate
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Timeout for the extraction call in milliseconds
    pub timeout_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider: "xai".to_string(),
            model: String::new(),
            max_tokens: 1024,
            temperature: 0.0,
            timeout_ms: 120_000,
        }
    }
}

/// Per-medicine enrichment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Maximum concurrent search calls (worker pool size)
    pub parallel: usize,

    /// Candidates requested from the search upstream per medicine
    pub results_per_query: u32,

    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,

    /// Maximum retries for retryable failures
    pub retry_attempts: u32,

    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            parallel: 5,
            results_per_query: 3,
            timeout_ms: 30_000,
            retry_attempts: 1,
            retry_delay_ms: 1000,
        }
    }
}

/// Firecrawl search/scrape upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirecrawlConfig {
    /// API base URL
    pub endpoint: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,
}

impl Default for FirecrawlConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.firecrawl.dev/v1".to_string(),
            api_key: "${FIRECRAWL_API_KEY}".to_string(),
        }
    }
}

/// Report synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Generate per-medicine prose with an LLM. When false, blocks are
    /// rendered straight from the collected records.
    pub summarize: bool,

    /// LLM provider for summaries; empty reuses the extraction provider
    pub provider: String,

    /// Model name; empty means the provider's configured default
    pub model: String,

    /// Maximum tokens per generated block
    pub max_tokens: u32,

    /// Timeout for each generation call in milliseconds
    pub timeout_ms: u64,

    /// Report heading
    pub title: String,

    /// Markdown appended after the last medicine block
    pub disclaimer: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            summarize: true,
            provider: String::new(),
            model: String::new(),
            max_tokens: 600,
            timeout_ms: 60_000,
            title: "Prescription Report".to_string(),
            disclaimer: DEFAULT_DISCLAIMER.to_string(),
        }
    }
}

/// Disclaimer shown at the foot of every report.
pub const DEFAULT_DISCLAIMER: &str = "\
**Medical disclaimer:** this report is for informational purposes only and is not a \
substitute for professional medical advice, diagnosis, or treatment.

- Always consult your doctor or pharmacist before taking any medication.
- Verify medicine names, dosages and instructions; automated reading of prescriptions can be wrong.
- Prices and availability come from public web sources and may be out of date.
- In an emergency, seek medical attention immediately.";

/// Pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Max events buffered between the pipeline and its consumer
    pub buffer_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { buffer_size: 64 }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum prescription image size in megabytes
    pub max_image_size_mb: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_image_size_mb: 20,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// LLM provider configurations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LlmConfig {
    /// xAI (Grok) configuration
    pub xai: Option<XaiConfig>,

    /// Anthropic configuration
    pub anthropic: Option<AnthropicConfig>,

    /// OpenAI configuration
    pub openai: Option<OpenAiConfig>,
}

/// xAI configuration (OpenAI-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XaiConfig {
    /// API endpoint
    pub endpoint: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model name
    pub model: String,
}

impl Default for XaiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.x.ai/v1".to_string(),
            api_key: "${XAI_API_KEY}".to_string(),
            model: "grok-4".to_string(),
        }
    }
}

/// Anthropic configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model name
    pub model: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: "${ANTHROPIC_API_KEY}".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
        }
    }
}

/// OpenAI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model name
    pub model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: "${OPENAI_API_KEY}".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}
