//! Configuration management for MedGuide.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. One `Config` is loaded per process and passed by reference into
//! the pipeline; nothing reads credentials from global state after that.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for MedGuide.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prescription reading settings
    pub extraction: ExtractionConfig,

    /// Per-medicine lookup settings
    pub enrichment: EnrichmentConfig,

    /// Search/scrape upstream
    pub firecrawl: FirecrawlConfig,

    /// Report synthesis settings
    pub report: ReportConfig,

    /// Pipeline settings
    pub pipeline: PipelineConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// LLM provider settings
    pub llm: LlmConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.medguide.medguide/config.toml
    /// - Linux: ~/.config/medguide/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\medguide\config\config.toml
    ///
    /// Falls back to ~/.medguide/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "medguide", "medguide")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".medguide").join("config.toml")
            })
    }

    /// Provider used for report summaries (falls back to the extraction provider).
    pub fn report_provider(&self) -> &str {
        if self.report.provider.is_empty() {
            &self.extraction.provider
        } else {
            &self.report.provider
        }
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
