//! Pipeline orchestration: wires extraction, enrichment and synthesis into a
//! single event stream.
//!
//! Each [`Pipeline::run`] spawns an independent task that walks the state
//! machine `Idle → Extracting → Enriching → Synthesizing → Done` (or
//! `Extracting → Failed`) and sends progress events and report fragments
//! into a bounded channel. The caller consumes the returned
//! [`PipelineStream`]; dropping it cancels the run.

use super::channel::{bounded_channel, ChannelStream};
use crate::config::{Config, LimitsConfig, PipelineConfig};
use crate::enrichment::{CoordinatorOptions, EnrichmentClient, EnrichmentCoordinator};
use crate::error::{ExtractionError, Result};
use crate::extraction::ExtractionClient;
use crate::image::PrescriptionImage;
use crate::llm::{LlmProvider, LlmProviderFactory};
use crate::report::{ReportOptions, ReportSynthesizer};
use crate::search::create_search_provider;
use crate::types::{
    LogLevel, MedicineName, PipelineEvent, PipelineState, ProgressEvent, Report, ReportFragment,
};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

/// Events of one run, in the order they happened.
pub type PipelineStream = ChannelStream<PipelineEvent>;

/// The three stage clients a pipeline is built from.
pub struct PipelineParts {
    pub extraction: ExtractionClient,
    pub coordinator: EnrichmentCoordinator,
    pub synthesizer: ReportSynthesizer,
}

struct Stages {
    extraction: ExtractionClient,
    coordinator: EnrichmentCoordinator,
    synthesizer: ReportSynthesizer,
}

/// Reusable entry point. Cheap to clone; runs share only read-only clients.
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<Stages>,
    channel: PipelineConfig,
    limits: LimitsConfig,
}

impl Pipeline {
    /// Assemble a pipeline from pre-built stage clients.
    pub fn new(parts: PipelineParts) -> Self {
        Self {
            stages: Arc::new(Stages {
                extraction: parts.extraction,
                coordinator: parts.coordinator,
                synthesizer: parts.synthesizer,
            }),
            channel: PipelineConfig::default(),
            limits: LimitsConfig::default(),
        }
    }

    /// Override channel buffering and input limits.
    pub fn with_settings(mut self, channel: PipelineConfig, limits: LimitsConfig) -> Self {
        self.channel = channel;
        self.limits = limits;
        self
    }

    /// Build every client from configuration.
    ///
    /// Fails if the extraction or search provider cannot be configured. A
    /// summarizer that cannot be configured is skipped with a warning and
    /// the report falls back to deterministic rendering.
    pub fn from_config(config: &Config) -> Result<Self> {
        let vision: Arc<dyn LlmProvider> = Arc::from(LlmProviderFactory::create(
            &config.extraction.provider,
            &config.llm,
            non_empty(&config.extraction.model),
        )?);

        let search = Arc::from(create_search_provider(&config.firecrawl)?);
        let client = EnrichmentClient::new(search, &config.enrichment);
        let coordinator =
            EnrichmentCoordinator::new(client, CoordinatorOptions::from(&config.enrichment));

        let options = ReportOptions::from(&config.report);
        let synthesizer = if !config.report.summarize {
            ReportSynthesizer::deterministic(options)
        } else {
            match summarizer_for(config, &vision) {
                Ok(writer) => ReportSynthesizer::with_summarizer(writer, options),
                Err(e) => {
                    tracing::warn!("Report summaries disabled: {e}");
                    ReportSynthesizer::deterministic(options)
                }
            }
        };

        let extraction = ExtractionClient::new(vision, &config.extraction);
        Ok(Self::new(PipelineParts {
            extraction,
            coordinator,
            synthesizer,
        })
        .with_settings(config.pipeline.clone(), config.limits.clone()))
    }

    /// Validate raw bytes and start a run.
    ///
    /// Invalid input is rejected here, before any stage is entered.
    pub fn run_bytes(&self, bytes: Vec<u8>) -> std::result::Result<PipelineStream, ExtractionError> {
        let image = PrescriptionImage::with_limits(bytes, &self.limits)?;
        Ok(self.run(image))
    }

    /// Start a run. Must be called within a tokio runtime.
    pub fn run(&self, image: PrescriptionImage) -> PipelineStream {
        let (tx, stream) = bounded_channel(&self.channel);
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline", run_id = %run_id);
        let stages = self.stages.clone();

        tokio::spawn(
            async move {
                let mut run = Run::new(tx);
                if drive(&stages, image, &mut run).await.is_err() {
                    tracing::info!(state = %run.state, "Consumer went away, run cancelled");
                }
            }
            .instrument(span),
        );
        stream
    }

    /// Run to completion and collect everything.
    pub async fn run_to_end(&self, image: PrescriptionImage) -> RunSummary {
        RunSummary::collect(self.run(image)).await
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub state: PipelineState,
    pub log: Vec<ProgressEvent>,
    pub report: Report,
}

impl RunSummary {
    /// Drain a stream. The final state is taken from the last progress event.
    pub async fn collect(mut stream: PipelineStream) -> Self {
        let mut summary = Self {
            state: PipelineState::Idle,
            log: Vec::new(),
            report: Report::new(),
        };
        while let Some(event) = stream.next().await {
            match event {
                PipelineEvent::Progress(progress) => {
                    summary.state = progress.state;
                    summary.log.push(progress);
                }
                PipelineEvent::Fragment(fragment) => summary.report.push(&fragment),
            }
        }
        summary
    }

    pub fn succeeded(&self) -> bool {
        self.state == PipelineState::Done
    }
}

/// Consumer dropped the pipeline stream.
struct Cancelled;

type Step = std::result::Result<(), Cancelled>;

/// State and output channel of one run.
struct Run {
    state: PipelineState,
    tx: mpsc::Sender<PipelineEvent>,
}

impl Run {
    fn new(tx: mpsc::Sender<PipelineEvent>) -> Self {
        Self {
            state: PipelineState::Idle,
            tx,
        }
    }

    async fn send(&self, event: PipelineEvent) -> Step {
        self.tx.send(event).await.map_err(|_| Cancelled)
    }

    async fn transition(&mut self, next: PipelineState, message: impl Into<String>) -> Step {
        if !self.state.can_transition_to(next) {
            tracing::error!(from = %self.state, to = %next, "Illegal pipeline transition");
        }
        tracing::info!(from = %self.state, to = %next, "Pipeline state change");
        self.state = next;

        let level = if next == PipelineState::Failed {
            LogLevel::Error
        } else {
            LogLevel::Info
        };
        self.progress(ProgressEvent::new(next, level, message)).await
    }

    async fn log(&self, level: LogLevel, message: impl Into<String>) -> Step {
        self.progress(ProgressEvent::new(self.state, level, message))
            .await
    }

    async fn progress(&self, event: ProgressEvent) -> Step {
        self.send(PipelineEvent::Progress(event)).await
    }

    async fn fragment(&self, fragment: ReportFragment) -> Step {
        self.send(PipelineEvent::Fragment(fragment)).await
    }
}

async fn drive(stages: &Stages, image: PrescriptionImage, run: &mut Run) -> Step {
    run.transition(
        PipelineState::Extracting,
        format!(
            "Reading prescription with {} ({}, {} KB)",
            stages.extraction.provider_name(),
            image.format(),
            image.len().div_ceil(1024)
        ),
    )
    .await?;

    let extraction = match stages.extraction.extract_detailed(&image).await {
        Ok(extraction) => extraction,
        Err(e) => {
            tracing::error!("Extraction failed: {e}");
            return run
                .transition(PipelineState::Failed, format!("Extraction failed: {e}"))
                .await;
        }
    };
    drop(image);

    for warning in &extraction.warnings {
        run.log(LogLevel::Warn, format!("Extraction response: {warning}"))
            .await?;
    }
    let names = extraction.names;
    run.log(LogLevel::Info, found_message(&names)).await?;

    run.transition(
        PipelineState::Enriching,
        format!(
            "Looking up {} medicine{} ({} at a time)",
            names.len(),
            if names.len() == 1 { "" } else { "s" },
            stages.coordinator.parallel()
        ),
    )
    .await?;

    let mut records = Vec::with_capacity(names.len());
    let mut lookups = stages.coordinator.enrich_all(names.clone());
    while let Some((record, event)) = lookups.next().await {
        run.progress(event).await?;
        records.push(record);
    }
    drop(lookups);

    if records.len() != names.len() {
        tracing::warn!(
            expected = names.len(),
            received = records.len(),
            "Enrichment returned fewer records than names"
        );
    }
    let failed = records.iter().filter(|r| r.is_failed()).count();

    let writer = match stages.synthesizer.summarizer_name() {
        Some(name) => format!(" with {name}"),
        None => String::new(),
    };
    run.transition(
        PipelineState::Synthesizing,
        format!(
            "Writing report{writer} ({} found, {failed} unavailable)",
            records.len() - failed
        ),
    )
    .await?;

    let mut report = stages.synthesizer.synthesize(&names, records);
    while let Some(fragment) = report.next().await {
        run.fragment(fragment).await?;
    }

    run.transition(PipelineState::Done, "Report complete").await
}

fn found_message(names: &[MedicineName]) -> String {
    if names.is_empty() {
        return "No medicines found on the prescription".to_string();
    }
    let listed: Vec<&str> = names.iter().map(MedicineName::as_str).collect();
    format!(
        "Found {} medicine{}: {}",
        names.len(),
        if names.len() == 1 { "" } else { "s" },
        listed.join(", ")
    )
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Reuse the vision client for summaries unless a different provider or
/// model is configured.
fn summarizer_for(
    config: &Config,
    vision: &Arc<dyn LlmProvider>,
) -> crate::error::UpstreamResult<Arc<dyn LlmProvider>> {
    let provider = config.report_provider();
    let model = non_empty(&config.report.model);
    if provider == config.extraction.provider && model.is_none() {
        return Ok(vision.clone());
    }
    Ok(Arc::from(LlmProviderFactory::create(
        provider,
        &config.llm,
        model,
    )?))
}
