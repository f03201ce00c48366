//! Error types for the MedGuide prescription pipeline.
//!
//! Errors are organized by stage. Only [`ExtractionError`] is fatal to a
//! request; upstream failures during enrichment and synthesis are recovered
//! and surface as data in the report.

use thiserror::Error;

/// Top-level error type for MedGuide operations.
#[derive(Error, Debug)]
pub enum MedGuideError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Prescription extraction errors (fatal to a request)
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Upstream service errors that escaped recovery
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Failures of the extraction stage.
///
/// `InvalidImage` is raised before any stage is entered; the other variants
/// move the pipeline into its terminal `Failed` state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The submitted payload is empty or not a supported image encoding
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// The vision model could not be reached or returned an error
    #[error("Extraction upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The model answered, but nothing resembling a medicine list could be read
    #[error("Malformed extraction response: {0}")]
    MalformedResponse(String),

    /// No response within the configured wait
    #[error("Extraction timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Errors from the LLM and search upstreams.
#[derive(Error, Debug, Clone)]
pub enum UpstreamError {
    /// LLM provider call failed
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        status_code: Option<u16>,
    },

    /// Search/scrape provider call failed
    #[error("Search error: {message}")]
    Search {
        message: String,
        status_code: Option<u16>,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage after {timeout_ms}ms")]
    Timeout { stage: String, timeout_ms: u64 },

    /// A provider was requested but has no usable credentials or name
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl UpstreamError {
    /// HTTP status code reported by the upstream, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UpstreamError::Llm { status_code, .. } | UpstreamError::Search { status_code, .. } => {
                *status_code
            }
            _ => None,
        }
    }
}

/// Convenience type alias for MedGuide results.
pub type Result<T> = std::result::Result<T, MedGuideError>;

/// Convenience type alias for upstream call results.
pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;
