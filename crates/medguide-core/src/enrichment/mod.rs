//! Enrichment stage: medicine names in, records with price, availability and
//! dosage out.
//!
//! - **client**: one lookup against the search upstream
//! - **parse**: search results to record fields
//! - **coordinator**: bounded concurrent fan-out over a name list

pub mod client;
pub mod coordinator;
pub mod parse;

pub use client::EnrichmentClient;
pub use coordinator::{CoordinatorOptions, EnrichmentCoordinator, EnrichmentItem, EnrichmentStream};
pub use parse::parse_hits;
