//! End-to-end pipeline runs against mock upstreams.

use async_trait::async_trait;
use futures_util::StreamExt;
use medguide_core::config::{EnrichmentConfig, ExtractionConfig, PipelineConfig};
use medguide_core::enrichment::{CoordinatorOptions, EnrichmentClient, EnrichmentCoordinator};
use medguide_core::error::{UpstreamError, UpstreamResult};
use medguide_core::extraction::ExtractionClient;
use medguide_core::llm::{LlmProvider, LlmRequest, LlmResponse, TextStream};
use medguide_core::report::{ReportOptions, ReportSynthesizer};
use medguide_core::search::{SearchHit, SearchProvider, SearchRequest};
use medguide_core::{
    LogLevel, Pipeline, PipelineEvent, PipelineParts, PipelineState, PrescriptionImage, RunSummary,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F', 0, 1];

struct MockVision {
    reply: UpstreamResult<String>,
}

#[async_trait]
impl LlmProvider for MockVision {
    fn name(&self) -> &str {
        "mock-vision"
    }
    async fn is_available(&self) -> bool {
        true
    }
    async fn generate(&self, _request: &LlmRequest) -> UpstreamResult<LlmResponse> {
        self.reply.clone().map(|text| LlmResponse {
            text,
            model: "mock".to_string(),
            tokens_used: Some(42),
            latency_ms: 1,
        })
    }
    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }
}

/// Streams a canned two-paragraph summary in small chunks.
struct MockWriter;

#[async_trait]
impl LlmProvider for MockWriter {
    fn name(&self) -> &str {
        "mock-writer"
    }
    async fn is_available(&self) -> bool {
        true
    }
    async fn generate(&self, _request: &LlmRequest) -> UpstreamResult<LlmResponse> {
        Err(UpstreamError::NotConfigured("streaming only".to_string()))
    }
    async fn generate_stream(&self, request: &LlmRequest) -> UpstreamResult<TextStream> {
        let medicine = request
            .prompt
            .lines()
            .next()
            .unwrap_or_default()
            .trim_start_matches("Medicine: ")
            .to_string();
        let chunks = vec![
            Ok("**Description:** ".to_string()),
            Ok(format!("{medicine} is a common medicine.")),
            Ok("\n\n**Typical Duration:** 5 days.".to_string()),
        ];
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }
    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }
}

struct MockSearch {
    delays: HashMap<String, Duration>,
    call_count: Arc<AtomicU32>,
    in_flight: Arc<AtomicU32>,
    max_in_flight: Arc<AtomicU32>,
}

impl MockSearch {
    fn new(delays: &[(&str, u64)]) -> Self {
        Self {
            delays: delays
                .iter()
                .map(|(name, ms)| (name.to_string(), Duration::from_millis(*ms)))
                .collect(),
            call_count: Arc::new(AtomicU32::new(0)),
            in_flight: Arc::new(AtomicU32::new(0)),
            max_in_flight: Arc::new(AtomicU32::new(0)),
        }
    }
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

        let medicine = request
            .query
            .trim_end_matches(" medicine price availability")
            .to_string();
        let delay = self
            .delays
            .get(&medicine)
            .copied()
            .unwrap_or(Duration::from_millis(20));
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(vec![SearchHit {
            url: format!("https://pharmacy.example/{}", medicine.to_lowercase()),
            title: medicine.clone(),
            description: format!("{medicine} is used to treat common conditions."),
            markdown: format!("# {medicine}\n\nPrice: ₹ 45.00\n\nIn stock"),
        }])
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }
}

struct Harness {
    pipeline: Pipeline,
    search_calls: Arc<AtomicU32>,
    max_in_flight: Arc<AtomicU32>,
}

fn harness(
    vision_reply: UpstreamResult<String>,
    search: MockSearch,
    parallel: usize,
    search_timeout_ms: u64,
    writer: Option<Arc<dyn LlmProvider>>,
) -> Harness {
    let search_calls = search.call_count.clone();
    let max_in_flight = search.max_in_flight.clone();

    let enrichment = EnrichmentConfig {
        parallel,
        timeout_ms: search_timeout_ms,
        retry_attempts: 0,
        ..Default::default()
    };
    let options = ReportOptions {
        title: "Prescription Report".to_string(),
        disclaimer: "Consult your doctor.".to_string(),
        max_tokens: 200,
        timeout: Duration::from_secs(2),
    };
    let synthesizer = match writer {
        Some(writer) => ReportSynthesizer::with_summarizer(writer, options),
        None => ReportSynthesizer::deterministic(options),
    };

    let pipeline = Pipeline::new(PipelineParts {
        extraction: ExtractionClient::new(
            Arc::new(MockVision {
                reply: vision_reply,
            }),
            &ExtractionConfig::default(),
        ),
        coordinator: EnrichmentCoordinator::new(
            EnrichmentClient::new(Arc::new(search), &enrichment),
            CoordinatorOptions::from(&enrichment),
        ),
        synthesizer,
    })
    .with_settings(PipelineConfig { buffer_size: 4 }, Default::default());

    Harness {
        pipeline,
        search_calls,
        max_in_flight,
    }
}

fn names_reply(names: &[&str]) -> UpstreamResult<String> {
    Ok(serde_json::json!({ "medicines": names }).to_string())
}

fn image() -> PrescriptionImage {
    PrescriptionImage::from_bytes(JPEG.to_vec()).unwrap()
}

fn block_positions(report: &str, names: &[&str]) -> Vec<usize> {
    names
        .iter()
        .map(|n| {
            report
                .find(&format!("## {n}\n"))
                .unwrap_or_else(|| panic!("no block for {n}"))
        })
        .collect()
}

#[tokio::test]
async fn test_report_keeps_detection_order_when_lookups_finish_out_of_order() {
    let search = MockSearch::new(&[("A", 200), ("B", 10), ("C", 100)]);
    let h = harness(names_reply(&["A", "B", "C"]), search, 3, 5_000, None);

    let summary = h.pipeline.run_to_end(image()).await;

    assert!(summary.succeeded());
    let completions: Vec<&str> = summary
        .log
        .iter()
        .filter(|e| e.state == PipelineState::Enriching && e.message.contains('/'))
        .map(|e| e.message.as_str())
        .collect();
    assert_eq!(completions.len(), 3);
    assert!(completions[0].contains(" B "));
    assert!(completions[2].contains(" A "));

    let positions = block_positions(summary.report.as_str(), &["A", "B", "C"]);
    assert!(positions[0] < positions[1] && positions[1] < positions[2]);
}

#[tokio::test]
async fn test_zero_names_makes_no_lookups() {
    let h = harness(names_reply(&[]), MockSearch::new(&[]), 3, 5_000, None);

    let summary = h.pipeline.run_to_end(image()).await;

    assert_eq!(summary.state, PipelineState::Done);
    assert_eq!(h.search_calls.load(Ordering::SeqCst), 0);
    assert_eq!(summary.report.fragment_count(), 2);
    assert!(summary.report.as_str().starts_with("# Prescription Report"));
    assert!(summary.report.as_str().contains("Consult your doctor."));
    assert!(!summary.report.as_str().contains("## "));
}

#[tokio::test]
async fn test_one_timeout_among_successes_still_completes() {
    let search = MockSearch::new(&[("Slow", 5_000)]);
    let h = harness(names_reply(&["Fast", "Slow", "Quick"]), search, 3, 150, None);

    let summary = h.pipeline.run_to_end(image()).await;

    assert_eq!(summary.state, PipelineState::Done);
    let report = summary.report.as_str();
    block_positions(report, &["Fast", "Slow", "Quick"]);
    assert_eq!(report.matches("Could not retrieve details").count(), 1);
    assert!(report.contains("## Slow\n\n> **Could not retrieve details.** Timeout"));
    assert!(summary
        .log
        .iter()
        .any(|e| e.level == LogLevel::Error && e.message.contains("Slow")));
}

#[tokio::test]
async fn test_extraction_failure_ends_in_failed_without_report() {
    let err = UpstreamError::Llm {
        message: "HTTP 503: unavailable".to_string(),
        status_code: Some(503),
    };
    let h = harness(Err(err), MockSearch::new(&[]), 3, 5_000, None);

    let summary = h.pipeline.run_to_end(image()).await;

    assert_eq!(summary.state, PipelineState::Failed);
    assert!(summary.report.is_empty());
    assert_eq!(h.search_calls.load(Ordering::SeqCst), 0);
    let states: Vec<_> = summary.log.iter().map(|e| e.state).collect();
    assert_eq!(states, vec![PipelineState::Extracting, PipelineState::Failed]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lookups_never_exceed_parallel_limit() {
    let names: Vec<String> = (1..=8).map(|i| format!("Med{i}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let h = harness(names_reply(&names), MockSearch::new(&[]), 2, 5_000, None);

    let summary = h.pipeline.run_to_end(image()).await;

    assert!(summary.succeeded());
    assert_eq!(h.search_calls.load(Ordering::SeqCst), 8);
    let peak = h.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak concurrency {peak}");
    block_positions(summary.report.as_str(), &names);
}

#[tokio::test]
async fn test_streamed_summary_flows_through_as_fragments() {
    let h = harness(
        names_reply(&["Azithromycin"]),
        MockSearch::new(&[]),
        1,
        5_000,
        Some(Arc::new(MockWriter)),
    );

    let mut stream = h.pipeline.run(image());
    let mut fragments = Vec::new();
    let mut saw_synthesizing = false;
    while let Some(event) = stream.next().await {
        match event {
            PipelineEvent::Progress(p) => {
                if p.state == PipelineState::Synthesizing {
                    saw_synthesizing = true;
                }
            }
            PipelineEvent::Fragment(f) => {
                assert!(saw_synthesizing, "fragment before synthesis started");
                fragments.push(f.text);
            }
        }
    }

    assert!(fragments.contains(&"Azithromycin is a common medicine.".to_string()));
    let report = fragments.concat();
    assert!(report.contains("**Typical Duration:** 5 days."));
    assert!(report.contains("**Price Information:** ₹ 45.00"));
    assert!(report.contains("<https://pharmacy.example/azithromycin>"));
}

#[tokio::test]
async fn test_dropping_stream_cancels_remaining_lookups() {
    let names: Vec<String> = (1..=10).map(|i| format!("Med{i}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let h = harness(names_reply(&names), MockSearch::new(&[]), 1, 5_000, None);

    let mut stream = h.pipeline.run(image());
    while let Some(event) = stream.next().await {
        if let PipelineEvent::Progress(p) = event {
            if p.state == PipelineState::Enriching && p.message.contains("[1/10]") {
                break;
            }
        }
    }
    drop(stream);

    tokio::time::sleep(Duration::from_millis(150)).await;
    let calls = h.search_calls.load(Ordering::SeqCst);
    assert!(calls < 10, "lookups kept going after cancel ({calls})");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runs_are_independent() {
    let h = harness(names_reply(&["X", "Y"]), MockSearch::new(&[]), 2, 5_000, None);

    let runs: Vec<_> = (0..3)
        .map(|_| RunSummary::collect(h.pipeline.run(image())))
        .collect();
    let summaries = futures_util::future::join_all(runs).await;

    for summary in &summaries {
        assert!(summary.succeeded());
        block_positions(summary.report.as_str(), &["X", "Y"]);
    }
    assert_eq!(h.search_calls.load(Ordering::SeqCst), 6);
}
