//! Concurrent enrichment of a medicine list.
//!
//! One tokio task per medicine, bounded by a semaphore. Each result is pushed
//! onto a channel the moment its task finishes, so the consumer sees
//! completion order, not detection order. The permit is acquired before the
//! task is spawned; at most `parallel` lookups are ever in flight.

use super::client::EnrichmentClient;
use crate::config::EnrichmentConfig;
use crate::llm::{backoff_duration, is_retryable};
use crate::pipeline::channel::{channel_with_capacity, ChannelStream};
use crate::types::{
    Availability, LogLevel, MedicineName, MedicineRecord, Outcome, PipelineState, ProgressEvent,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// One finished lookup and the progress line that announces it.
pub type EnrichmentItem = (MedicineRecord, ProgressEvent);

/// Records in completion order. Dropping it stops further dispatch.
pub type EnrichmentStream = ChannelStream<EnrichmentItem>;

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Maximum concurrent lookups
    pub parallel: usize,
    /// Maximum retries per medicine
    pub retry_attempts: u32,
    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self::from(&EnrichmentConfig::default())
    }
}

impl From<&EnrichmentConfig> for CoordinatorOptions {
    fn from(config: &EnrichmentConfig) -> Self {
        Self {
            parallel: config.parallel.max(1),
            retry_attempts: config.retry_attempts,
            retry_delay_ms: config.retry_delay_ms,
        }
    }
}

pub struct EnrichmentCoordinator {
    client: Arc<EnrichmentClient>,
    options: CoordinatorOptions,
}

impl EnrichmentCoordinator {
    pub fn new(client: EnrichmentClient, options: CoordinatorOptions) -> Self {
        Self {
            client: Arc::new(client),
            options,
        }
    }

    pub fn parallel(&self) -> usize {
        self.options.parallel
    }

    /// Enrich every name concurrently.
    ///
    /// Yields exactly one record per name unless the stream is dropped
    /// early. Lookups already in flight at that point run to completion and
    /// their results are discarded.
    pub fn enrich_all(&self, names: Vec<MedicineName>) -> EnrichmentStream {
        let (tx, stream) = channel_with_capacity(names.len());
        if names.is_empty() {
            return stream;
        }

        let client = self.client.clone();
        let options = self.options.clone();
        tokio::spawn(dispatch(client, options, names, tx));
        stream
    }
}

async fn dispatch(
    client: Arc<EnrichmentClient>,
    options: CoordinatorOptions,
    names: Vec<MedicineName>,
    tx: mpsc::Sender<EnrichmentItem>,
) {
    let total = names.len();
    let semaphore = Arc::new(Semaphore::new(options.parallel.max(1)));
    let completed = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::with_capacity(total);

    for name in names {
        let permit = tokio::select! {
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::warn!("Enrichment semaphore closed unexpectedly, stopping dispatch");
                    break;
                }
            },
            _ = tx.closed() => {
                tracing::debug!("Consumer went away, stopping dispatch");
                break;
            }
        };

        let client = client.clone();
        let options = options.clone();
        let completed = completed.clone();
        let tx = tx.clone();
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            let record = enrich_with_retry(&client, &task_name, &options).await;
            drop(permit);
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            let event = completion_event(&record, done, total);
            // A closed channel means the consumer stopped listening.
            let _ = tx.send((record, event)).await;
        });
        handles.push((name, handle));
    }

    for (name, handle) in handles {
        if let Err(e) = handle.await {
            tracing::error!(medicine = %name, "Enrichment task panicked: {e}");
            let record = MedicineRecord::failed(name, "internal error during lookup");
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            let event = completion_event(&record, done, total);
            let _ = tx.send((record, event)).await;
        }
    }
}

async fn enrich_with_retry(
    client: &EnrichmentClient,
    name: &MedicineName,
    options: &CoordinatorOptions,
) -> MedicineRecord {
    let mut last_error = String::new();
    for attempt in 0..=options.retry_attempts {
        if attempt > 0 {
            let delay = backoff_duration(attempt - 1, options.retry_delay_ms);
            tracing::debug!(
                medicine = %name,
                "Retry {attempt}/{} after {delay:?}",
                options.retry_attempts
            );
            tokio::time::sleep(delay).await;
        }

        match client.lookup(name).await {
            Ok(record) => return record,
            Err(e) => {
                last_error = e.to_string();
                if !is_retryable(&e) {
                    break;
                }
            }
        }
    }

    tracing::warn!(medicine = %name, "Enrichment failed: {last_error}");
    MedicineRecord::failed(name.clone(), last_error)
}

fn completion_event(record: &MedicineRecord, done: usize, total: usize) -> ProgressEvent {
    let (level, message) = match &record.outcome {
        Outcome::Success => (
            LogLevel::Info,
            format!("Fetched details for {}", record.name),
        ),
        Outcome::Partial => {
            let mut missing = Vec::new();
            if record.price.is_none() {
                missing.push("price");
            }
            if record.availability == Availability::Unknown {
                missing.push("availability");
            }
            (
                LogLevel::Warn,
                format!(
                    "Partial details for {} ({} unknown)",
                    record.name,
                    missing.join(" and ")
                ),
            )
        }
        Outcome::Failed { reason } => (
            LogLevel::Error,
            format!("Could not retrieve details for {}: {reason}", record.name),
        ),
    };
    ProgressEvent::new(
        PipelineState::Enriching,
        level,
        format!("{message} [{done}/{total}]"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{UpstreamError, UpstreamResult};
    use crate::search::{SearchHit, SearchProvider, SearchRequest};
    use async_trait::async_trait;
    use futures_util::StreamExt;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    /// Search mock with per-query delays and failure scripts.
    ///
    /// `in_flight` and `max_in_flight` track concurrency so tests can assert
    /// the semaphore bound.
    struct MockSearch {
        delays: HashMap<String, Duration>,
        /// Number of leading calls per query that fail with a 503
        failures: HashMap<String, u32>,
        calls: std::sync::Mutex<HashMap<String, u32>>,
        call_count: Arc<AtomicU32>,
        in_flight: Arc<AtomicU32>,
        max_in_flight: Arc<AtomicU32>,
    }

    impl MockSearch {
        fn new() -> Self {
            Self {
                delays: HashMap::new(),
                failures: HashMap::new(),
                calls: std::sync::Mutex::new(HashMap::new()),
                call_count: Arc::new(AtomicU32::new(0)),
                in_flight: Arc::new(AtomicU32::new(0)),
                max_in_flight: Arc::new(AtomicU32::new(0)),
            }
        }

        fn delay(mut self, name: &str, ms: u64) -> Self {
            self.delays
                .insert(name.to_string(), Duration::from_millis(ms));
            self
        }

        fn fail_first(mut self, name: &str, times: u32) -> Self {
            self.failures.insert(name.to_string(), times);
            self
        }
    }

    fn medicine_of(query: &str) -> String {
        query
            .trim_end_matches(" medicine price availability")
            .to_string()
    }

    #[async_trait]
    impl SearchProvider for MockSearch {
        fn name(&self) -> &str {
            "mock-search"
        }

        async fn search(&self, request: &SearchRequest) -> UpstreamResult<Vec<SearchHit>> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            let medicine = medicine_of(&request.query);
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                let entry = calls.entry(medicine.clone()).or_insert(0);
                *entry += 1;
                *entry
            };

            let delay = self
                .delays
                .get(&medicine)
                .copied()
                .unwrap_or(Duration::from_millis(10));
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if attempt <= self.failures.get(&medicine).copied().unwrap_or(0) {
                return Err(UpstreamError::Search {
                    message: "HTTP 503: overloaded".to_string(),
                    status_code: Some(503),
                });
            }

            Ok(vec![SearchHit {
                url: format!("https://pharmacy.example/{}", medicine.to_lowercase()),
                title: medicine.clone(),
                description: format!("{medicine} tablets."),
                markdown: "₹ 99 | In stock".to_string(),
            }])
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(5)
        }
    }

    fn coordinator(search: MockSearch, parallel: usize, timeout_ms: u64) -> EnrichmentCoordinator {
        let config = EnrichmentConfig {
            parallel,
            timeout_ms,
            retry_attempts: 2,
            retry_delay_ms: 1,
            ..Default::default()
        };
        let client = EnrichmentClient::new(Arc::new(search), &config);
        EnrichmentCoordinator::new(client, CoordinatorOptions::from(&config))
    }

    fn names(list: &[&str]) -> Vec<MedicineName> {
        list.iter().filter_map(|s| MedicineName::parse(s)).collect()
    }

    #[tokio::test]
    async fn test_one_record_per_name() {
        let coordinator = coordinator(MockSearch::new(), 3, 1000);
        let items: Vec<_> = coordinator
            .enrich_all(names(&["A", "B", "C", "D", "E"]))
            .collect()
            .await;

        let mut got: Vec<_> = items.iter().map(|(r, _)| r.name.as_str()).collect();
        got.sort();
        assert_eq!(got, vec!["A", "B", "C", "D", "E"]);
        assert!(items.iter().all(|(r, _)| r.outcome == Outcome::Success));
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_parallel() {
        let search = MockSearch::new();
        let max_in_flight = search.max_in_flight.clone();
        let all: Vec<String> = (0..12).map(|i| format!("Med{i}")).collect();
        let all: Vec<&str> = all.iter().map(String::as_str).collect();

        let coordinator = coordinator(search, 3, 1000);
        let items: Vec<_> = coordinator.enrich_all(names(&all)).collect().await;

        assert_eq!(items.len(), 12);
        let peak = max_in_flight.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak} exceeded bound");
        assert!(peak >= 2, "lookups did not overlap");
    }

    #[tokio::test]
    async fn test_results_arrive_in_completion_order() {
        let search = MockSearch::new().delay("A", 150).delay("B", 10).delay("C", 80);
        let coordinator = coordinator(search, 3, 1000);
        let order: Vec<String> = coordinator
            .enrich_all(names(&["A", "B", "C"]))
            .map(|(r, _)| r.name.as_str().to_string())
            .collect()
            .await;
        assert_eq!(order, vec!["B", "C", "A"]);
    }

    #[tokio::test]
    async fn test_progress_counts_completions() {
        let coordinator = coordinator(MockSearch::new(), 2, 1000);
        let events: Vec<_> = coordinator
            .enrich_all(names(&["A", "B"]))
            .map(|(_, e)| e)
            .collect()
            .await;
        assert!(events[0].message.ends_with("[1/2]"));
        assert!(events[1].message.ends_with("[2/2]"));
        assert!(events.iter().all(|e| e.state == PipelineState::Enriching));
    }

    #[tokio::test]
    async fn test_timeout_fails_only_that_medicine() {
        let search = MockSearch::new().delay("Slow", 2_000);
        let coordinator = coordinator(search, 3, 100);
        let items: Vec<_> = coordinator
            .enrich_all(names(&["Fast", "Slow", "Quick"]))
            .collect()
            .await;

        assert_eq!(items.len(), 3);
        for (record, event) in &items {
            if record.name.as_str() == "Slow" {
                assert!(record.failure_reason().unwrap().contains("Timeout"));
                assert_eq!(event.level, LogLevel::Error);
            } else {
                assert_eq!(record.outcome, Outcome::Success);
            }
        }
    }

    #[tokio::test]
    async fn test_retryable_error_is_retried() {
        let search = MockSearch::new().fail_first("Flaky", 2);
        let call_count = search.call_count.clone();
        let coordinator = coordinator(search, 1, 1000);
        let items: Vec<_> = coordinator.enrich_all(names(&["Flaky"])).collect().await;

        assert_eq!(items[0].0.outcome, Outcome::Success);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted_gives_failed_record() {
        let search = MockSearch::new().fail_first("Down", 10);
        let call_count = search.call_count.clone();
        let coordinator = coordinator(search, 1, 1000);
        let items: Vec<_> = coordinator.enrich_all(names(&["Down"])).collect().await;

        assert!(items[0].0.failure_reason().unwrap().contains("503"));
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_input_ends_immediately() {
        let search = MockSearch::new();
        let call_count = search.call_count.clone();
        let coordinator = coordinator(search, 3, 1000);
        let items: Vec<_> = coordinator.enrich_all(Vec::new()).collect().await;
        assert!(items.is_empty());
        assert_eq!(call_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dropping_stream_stops_dispatch() {
        let search = MockSearch::new().delay("A", 50).delay("B", 50);
        let call_count = search.call_count.clone();
        let all: Vec<String> = (0..20).map(|i| format!("M{i}")).collect();
        let all: Vec<&str> = all.iter().map(String::as_str).collect();

        let coordinator = coordinator(search, 1, 1000);
        let mut stream = coordinator.enrich_all(names(&all));
        let first = stream.next().await;
        assert!(first.is_some());
        drop(stream);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let calls = call_count.load(Ordering::SeqCst);
        assert!(calls < 20, "dispatch continued after consumer left ({calls} calls)");
    }
}
