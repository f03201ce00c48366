//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

const KNOWN_PROVIDERS: &[&str] = &["xai", "openai", "anthropic"];

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enrichment.parallel == 0 {
            return Err(ConfigError::ValidationError(
                "enrichment.parallel must be > 0".into(),
            ));
        }
        if self.enrichment.results_per_query == 0 {
            return Err(ConfigError::ValidationError(
                "enrichment.results_per_query must be > 0".into(),
            ));
        }
        if self.enrichment.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "enrichment.timeout_ms must be > 0".into(),
            ));
        }
        if self.extraction.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "extraction.timeout_ms must be > 0".into(),
            ));
        }
        if self.report.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "report.timeout_ms must be > 0".into(),
            ));
        }
        if self.pipeline.buffer_size == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.buffer_size must be > 0".into(),
            ));
        }
        if self.limits.max_image_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_size_mb must be > 0".into(),
            ));
        }
        if !KNOWN_PROVIDERS.contains(&self.extraction.provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "extraction.provider must be one of {}, got '{}'",
                KNOWN_PROVIDERS.join(", "),
                self.extraction.provider
            )));
        }
        if !self.report.provider.is_empty()
            && !KNOWN_PROVIDERS.contains(&self.report.provider.as_str())
        {
            return Err(ConfigError::ValidationError(format!(
                "report.provider must be empty or one of {}, got '{}'",
                KNOWN_PROVIDERS.join(", "),
                self.report.provider
            )));
        }
        Ok(())
    }
}
