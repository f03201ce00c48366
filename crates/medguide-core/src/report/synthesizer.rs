//! Streaming report synthesis.
//!
//! The report is written by a spawned task into a bounded channel, one
//! fragment at a time: header, then per block its heading followed by prose
//! chunks and facts, then the footer. Blocks follow detection order no matter
//! in which order the records arrived.

use super::render;
use crate::config::ReportConfig;
use crate::llm::{LlmProvider, LlmRequest};
use crate::pipeline::channel::{channel_with_capacity, ChannelStream};
use crate::types::{MedicineName, MedicineRecord, ReportFragment};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

/// Fragments in report order. Dropping it stops generation.
pub type ReportStream = ChannelStream<ReportFragment>;

const FRAGMENT_BUFFER: usize = 16;

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub title: String,
    pub disclaimer: String,
    /// Maximum tokens per generated block
    pub max_tokens: u32,
    /// Deadline for each generation call, first chunk to last
    pub timeout: Duration,
}

impl From<&ReportConfig> for ReportOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            title: config.title.clone(),
            disclaimer: config.disclaimer.clone(),
            max_tokens: config.max_tokens,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self::from(&ReportConfig::default())
    }
}

/// Consumer dropped the report stream.
struct Disconnected;

type Emit = Result<(), Disconnected>;

struct Writer {
    tx: mpsc::Sender<ReportFragment>,
}

impl Writer {
    async fn emit(&self, text: impl Into<String>) -> Emit {
        let text = text.into();
        if text.is_empty() {
            return Ok(());
        }
        self.tx
            .send(ReportFragment::new(text))
            .await
            .map_err(|_| Disconnected)
    }
}

#[derive(Clone)]
pub struct ReportSynthesizer {
    summarizer: Option<Arc<dyn LlmProvider>>,
    options: ReportOptions,
}

impl ReportSynthesizer {
    /// Render every block from the records alone.
    pub fn deterministic(options: ReportOptions) -> Self {
        Self {
            summarizer: None,
            options,
        }
    }

    /// Generate block prose with `summarizer`, falling back to the
    /// deterministic rendering per block.
    pub fn with_summarizer(summarizer: Arc<dyn LlmProvider>, options: ReportOptions) -> Self {
        Self {
            summarizer: Some(summarizer),
            options,
        }
    }

    pub fn summarizer_name(&self) -> Option<&str> {
        self.summarizer.as_ref().map(|s| s.name())
    }

    /// Stream the report for `records`, laid out in the order of `order`.
    ///
    /// Names without a record get a failed block; records for names not in
    /// `order` are appended at the end.
    pub fn synthesize(&self, order: &[MedicineName], records: Vec<MedicineRecord>) -> ReportStream {
        let (tx, stream) = channel_with_capacity(FRAGMENT_BUFFER);
        let ordered = arrange(order, records);
        let this = self.clone();
        let names = order.to_vec();

        tokio::spawn(async move {
            let writer = Writer { tx };
            if this.write_report(&writer, &names, &ordered).await.is_err() {
                tracing::debug!("Report consumer went away, stopping synthesis");
            }
        });
        stream
    }

    async fn write_report(
        &self,
        writer: &Writer,
        names: &[MedicineName],
        records: &[MedicineRecord],
    ) -> Emit {
        writer
            .emit(render::header(&self.options.title, names))
            .await?;
        for record in records {
            self.write_block(writer, record).await?;
        }
        writer.emit(render::footer(&self.options.disclaimer)).await
    }

    async fn write_block(&self, writer: &Writer, record: &MedicineRecord) -> Emit {
        writer.emit(render::block_heading(record)).await?;

        if let Some(reason) = record.failure_reason() {
            return writer.emit(render::failed_block(reason)).await;
        }

        match &self.summarizer {
            Some(summarizer) => self.write_generated_prose(writer, summarizer, record).await?,
            None => writer.emit(render::prose(record)).await?,
        }
        writer.emit(render::facts(record)).await
    }

    /// Stream prose from the LLM. On any failure, append a note and the
    /// deterministic prose after whatever was already emitted.
    async fn write_generated_prose(
        &self,
        writer: &Writer,
        summarizer: &Arc<dyn LlmProvider>,
        record: &MedicineRecord,
    ) -> Emit {
        let request = LlmRequest::summarize_medicine(record, self.options.max_tokens);
        let deadline = Instant::now() + self.options.timeout;
        let mut emitted = false;

        let failure = match timeout_at(deadline, summarizer.generate_stream(&request)).await {
            Err(_) => Some(self.timeout_reason()),
            Ok(Err(e)) => Some(e.to_string()),
            Ok(Ok(mut chunks)) => loop {
                match timeout_at(deadline, chunks.next()).await {
                    Err(_) => break Some(self.timeout_reason()),
                    Ok(None) if emitted => break None,
                    Ok(None) => break Some("empty response".to_string()),
                    Ok(Some(Err(e))) => break Some(e.to_string()),
                    Ok(Some(Ok(chunk))) => {
                        if !chunk.is_empty() {
                            emitted = true;
                            writer.emit(chunk).await?;
                        }
                    }
                }
            },
        };

        match failure {
            None => writer.emit("\n\n").await,
            Some(reason) => {
                tracing::warn!(
                    medicine = %record.name,
                    "Summary generation failed, using collected details: {reason}"
                );
                if emitted {
                    writer.emit(render::fallback_note(&reason)).await?;
                }
                writer.emit(render::prose(record)).await
            }
        }
    }

    fn timeout_reason(&self) -> String {
        format!("timed out after {}ms", self.options.timeout.as_millis())
    }
}

/// Put records into detection order.
fn arrange(order: &[MedicineName], records: Vec<MedicineRecord>) -> Vec<MedicineRecord> {
    let mut remaining: Vec<Option<MedicineRecord>> = records.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(remaining.len().max(order.len()));

    for name in order {
        let key = name.key();
        let found = remaining
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|r| r.name.key() == key))
            .and_then(Option::take);
        match found {
            Some(record) => ordered.push(record),
            None => {
                tracing::warn!(medicine = %name, "No enrichment result for medicine");
                ordered.push(MedicineRecord::failed(name.clone(), "no enrichment result"));
            }
        }
    }

    ordered.extend(remaining.into_iter().flatten());
    ordered
}
