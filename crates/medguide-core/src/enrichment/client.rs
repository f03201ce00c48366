//! Single-medicine lookup against the search upstream.

use super::parse::parse_hits;
use crate::config::EnrichmentConfig;
use crate::error::{UpstreamError, UpstreamResult};
use crate::search::{SearchProvider, SearchRequest};
use crate::types::{MedicineName, MedicineRecord, ParseOutcome};
use std::sync::Arc;
use std::time::Duration;

pub struct EnrichmentClient {
    provider: Arc<dyn SearchProvider>,
    timeout: Duration,
    results_per_query: u32,
}

impl EnrichmentClient {
    pub fn new(provider: Arc<dyn SearchProvider>, config: &EnrichmentConfig) -> Self {
        Self {
            provider,
            timeout: Duration::from_millis(config.timeout_ms),
            results_per_query: config.results_per_query,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Look up one medicine.
    ///
    /// Upstream errors and timeouts are returned so the caller can decide
    /// whether to retry. A search that answers but yields nothing usable is
    /// not an error: it comes back as a failed record.
    pub async fn lookup(&self, name: &MedicineName) -> UpstreamResult<MedicineRecord> {
        let request = SearchRequest::medicine(name.as_str(), self.results_per_query);

        let hits = match tokio::time::timeout(self.timeout, self.provider.search(&request)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(UpstreamError::Timeout {
                    stage: "enrichment".to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        };

        tracing::debug!(medicine = %name, hits = hits.len(), "Search returned");

        Ok(match parse_hits(name, &hits) {
            ParseOutcome::Full(record) => record,
            ParseOutcome::Partial { value, warnings } => {
                tracing::debug!(medicine = %name, ?warnings, "Incomplete search results");
                value
            }
            ParseOutcome::Unparseable(reason) => MedicineRecord::failed(name.clone(), reason),
        })
    }

    /// Look up one medicine, folding every error into a failed record.
    pub async fn enrich(&self, name: &MedicineName) -> MedicineRecord {
        match self.lookup(name).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(medicine = %name, "Enrichment failed: {e}");
                MedicineRecord::failed(name.clone(), e.to_string())
            }
        }
    }
}
