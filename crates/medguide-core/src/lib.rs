//! MedGuide Core - prescription analysis pipeline.
//!
//! Takes a photo of a handwritten prescription and streams back a markdown
//! report on every medicine it names: what it is, how long it is usually
//! taken, what it costs and where to buy it.
//!
//! # Architecture
//!
//! ```text
//! Image → Extraction (vision LLM) → names
//!       → Enrichment (web search, N at a time) → records
//!       → Report synthesis (streamed) → markdown
//! ```
//!
//! Only extraction failures abort a run. A medicine that cannot be looked up
//! shows up in the report as a marked gap instead.
//!
//! # Usage
//!
//! ```rust,ignore
//! use futures_util::StreamExt;
//! use medguide_core::{Config, Pipeline, PipelineEvent};
//!
//! #[tokio::main]
//! async fn main() -> medguide_core::Result<()> {
//!     let config = Config::load()?;
//!     let pipeline = Pipeline::from_config(&config)?;
//!
//!     let mut events = pipeline.run_bytes(std::fs::read("rx.jpg")?)?;
//!     while let Some(event) = events.next().await {
//!         match event {
//!             PipelineEvent::Progress(p) => eprintln!("{}", p.message),
//!             PipelineEvent::Fragment(f) => print!("{}", f.text),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod enrichment;
pub mod error;
pub mod extraction;
pub mod image;
pub mod llm;
pub mod pipeline;
pub mod report;
pub mod search;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, ExtractionError, MedGuideError, Result, UpstreamError};
pub use image::{ImageFormat, PrescriptionImage};
pub use pipeline::{Pipeline, PipelineParts, PipelineStream, RunSummary};
pub use types::{
    Availability, LogLevel, MedicineName, MedicineRecord, Outcome, PipelineEvent, PipelineState,
    ProgressEvent, Report, ReportFragment,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
