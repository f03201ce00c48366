//! Pipeline orchestration.
//!
//! - **channel**: bounded channels exposed as streams
//! - **orchestrator**: the state machine driving one run end to end

pub mod channel;
pub mod orchestrator;

pub use channel::{bounded_channel, ChannelStream};
pub use orchestrator::{Pipeline, PipelineParts, PipelineStream, RunSummary};
