//! Firecrawl search provider.
//!
//! Uses the `/search` endpoint with markdown scraping so each hit carries the
//! page content, not just a snippet.

use super::provider::{SearchHit, SearchProvider, SearchRequest};
use crate::error::{UpstreamError, UpstreamResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Firecrawl search/scrape client.
pub struct FirecrawlProvider {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl FirecrawlProvider {
    pub fn new(endpoint: &str, api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            endpoint: format!("{}/search", endpoint.trim_end_matches('/')),
            client: reqwest::Client::new(),
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FirecrawlSearchRequest<'a> {
    query: &'a str,
    limit: u32,
    scrape_options: ScrapeOptions,
}

#[derive(Serialize)]
struct ScrapeOptions {
    formats: Vec<&'static str>,
}

// --- Response types ---

#[derive(Deserialize)]
struct FirecrawlSearchResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<SearchHit>,
    #[serde(default)]
    error: Option<String>,
}

/// Turn a raw response body into hits.
fn parse_response(body: &str) -> UpstreamResult<Vec<SearchHit>> {
    let resp: FirecrawlSearchResponse =
        serde_json::from_str(body).map_err(|e| UpstreamError::Search {
            message: format!("Failed to parse Firecrawl response: {e}"),
            status_code: None,
        })?;
    if !resp.success {
        return Err(UpstreamError::Search {
            message: resp
                .error
                .unwrap_or_else(|| "Firecrawl reported an unsuccessful search".to_string()),
            status_code: None,
        });
    }
    Ok(resp.data)
}

#[async_trait]
impl SearchProvider for FirecrawlProvider {
    fn name(&self) -> &str {
        "firecrawl"
    }

    async fn search(&self, request: &SearchRequest) -> UpstreamResult<Vec<SearchHit>> {
        let start = Instant::now();
        let body = FirecrawlSearchRequest {
            query: &request.query,
            limit: request.limit,
            scrape_options: ScrapeOptions {
                formats: vec!["markdown"],
            },
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.timeout())
            .send()
            .await
            .map_err(|e| UpstreamError::Search {
                message: format!("Firecrawl request failed: {e}"),
                status_code: None,
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| UpstreamError::Search {
            message: format!("Failed to read Firecrawl response: {e}"),
            status_code: Some(status.as_u16()),
        })?;
        if !status.is_success() {
            return Err(UpstreamError::Search {
                message: format!("Firecrawl HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let hits = parse_response(&text)?;
        tracing::debug!(
            query = %request.query,
            hits = hits.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Firecrawl search complete"
        );
        Ok(hits)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = FirecrawlSearchRequest {
            query: "Dolo 650 medicine price availability",
            limit: 3,
            scrape_options: ScrapeOptions {
                formats: vec!["markdown"],
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["limit"], 3);
        assert_eq!(json["scrapeOptions"]["formats"][0], "markdown");
    }

    #[test]
    fn test_parse_response_tolerates_missing_fields() {
        let body = r##"{"success":true,"data":[{"url":"https://a.example","markdown":"# A"},{"title":"only title"}]}"##;
        let hits = parse_response(body).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://a.example");
        assert!(hits[0].description.is_empty());
        assert!(hits[1].url.is_empty());
    }

    #[test]
    fn test_parse_response_unsuccessful() {
        let err = parse_response(r#"{"success":false,"error":"Insufficient credits"}"#).unwrap_err();
        assert!(err.to_string().contains("Insufficient credits"));
    }

    #[test]
    fn test_parse_response_garbage() {
        assert!(parse_response("<html>").is_err());
    }

    #[test]
    fn test_endpoint_joined() {
        let provider = FirecrawlProvider::new("https://api.firecrawl.dev/v1/", "key");
        assert_eq!(provider.endpoint, "https://api.firecrawl.dev/v1/search");
    }
}
