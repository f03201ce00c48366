//! Search provider trait and result types.

use crate::config::FirecrawlConfig;
use crate::error::{UpstreamError, UpstreamResult};
use crate::llm::resolve_env_var;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One candidate page returned by a search/scrape upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub description: String,
    /// Scraped page content as markdown
    pub markdown: String,
}

impl SearchHit {
    /// A hit is usable when it points somewhere and carries some content.
    pub fn is_well_formed(&self) -> bool {
        let url = self.url.trim();
        (url.starts_with("http://") || url.starts_with("https://"))
            && (!self.markdown.trim().is_empty() || !self.description.trim().is_empty())
    }
}

/// A search request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    /// Maximum number of candidates to return
    pub limit: u32,
}

impl SearchRequest {
    /// The lookup issued for each medicine.
    pub fn medicine(name: &str, limit: u32) -> Self {
        Self {
            query: format!("{name} medicine price availability"),
            limit,
        }
    }
}

/// Trait that all search/scrape providers implement.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Run a search and return candidate pages, best first.
    async fn search(&self, request: &SearchRequest) -> UpstreamResult<Vec<SearchHit>>;

    /// Per-request timeout for this provider.
    fn timeout(&self) -> Duration;
}

/// Build the configured search provider.
pub fn create_search_provider(config: &FirecrawlConfig) -> UpstreamResult<Box<dyn SearchProvider>> {
    let api_key = resolve_env_var(&config.api_key).ok_or_else(|| {
        UpstreamError::NotConfigured(
            "Firecrawl API key not set. Set FIRECRAWL_API_KEY env var.".to_string(),
        )
    })?;
    Ok(Box::new(super::firecrawl::FirecrawlProvider::new(
        &config.endpoint,
        &api_key,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_medicine_query() {
        let request = SearchRequest::medicine("Dolo 650", 3);
        assert_eq!(request.query, "Dolo 650 medicine price availability");
        assert_eq!(request.limit, 3);
    }

    #[test]
    fn test_well_formed_hit() {
        let hit = SearchHit {
            url: "https://pharmacy.example/dolo".to_string(),
            markdown: "# Dolo 650".to_string(),
            ..Default::default()
        };
        assert!(hit.is_well_formed());

        let no_url = SearchHit {
            markdown: "text".to_string(),
            ..Default::default()
        };
        assert!(!no_url.is_well_formed());

        let no_content = SearchHit {
            url: "https://pharmacy.example".to_string(),
            ..Default::default()
        };
        assert!(!no_content.is_well_formed());
    }

    #[test]
    fn test_create_requires_key() {
        let config = FirecrawlConfig {
            endpoint: "https://api.firecrawl.dev/v1".to_string(),
            api_key: "${DEFINITELY_NOT_SET_FC_KEY_987}".to_string(),
        };
        assert!(matches!(
            create_search_provider(&config),
            Err(UpstreamError::NotConfigured(_))
        ));

        let config = FirecrawlConfig {
            api_key: "fc-literal".to_string(),
            ..config
        };
        assert_eq!(create_search_provider(&config).unwrap().name(), "firecrawl");
    }
}
