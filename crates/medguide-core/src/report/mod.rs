//! Report synthesis: enrichment records in, markdown report fragments out.

pub mod render;
pub mod synthesizer;

pub use synthesizer::{ReportOptions, ReportStream, ReportSynthesizer};
