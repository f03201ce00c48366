//! Core data types for the MedGuide pipeline.
//!
//! Records, events and report fragments are plain immutable values: they are
//! created by one stage and moved to the next, never mutated in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A medicine name as read from a prescription.
///
/// Always normalized: trimmed, list markers stripped, inner whitespace
/// collapsed. Construct with [`MedicineName::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MedicineName(String);

impl MedicineName {
    /// Normalize raw text into a name. Returns `None` if nothing remains.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw
            .trim()
            .trim_start_matches(|c: char| {
                c == '-' || c == '*' || c == '•' || c == '+' || c.is_whitespace()
            })
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == ',');
        let trimmed = strip_ordinal(trimmed);
        let collapsed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            None
        } else {
            Some(Self(collapsed))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive identity used for deduplication.
    pub fn key(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for MedicineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strip a leading "1. " / "2) " list ordinal. The marker must be followed
/// by whitespace so strengths like "0.9%" survive.
fn strip_ordinal(s: &str) -> &str {
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return s;
    }
    let rest = &s[digits..];
    let mut chars = rest.chars();
    match (chars.next(), chars.next()) {
        (Some('.') | Some(')'), Some(c)) if c.is_whitespace() => rest[1..].trim_start(),
        _ => s,
    }
}

/// Deduplicate names case-insensitively, keeping first occurrence order.
pub fn dedup_names(names: impl IntoIterator<Item = MedicineName>) -> Vec<MedicineName> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.key()))
        .collect()
}

/// Stock status of a medicine at the scraped source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Unavailable,
    #[default]
    Unknown,
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Available => write!(f, "Available"),
            Availability::Unavailable => write!(f, "Unavailable"),
            Availability::Unknown => write!(f, "Unknown"),
        }
    }
}

/// How completely a medicine could be enriched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// All key fields resolved
    Success,
    /// A candidate was found, but price or availability is unresolved
    Partial,
    /// Nothing usable; `reason` is shown to the user
    Failed { reason: String },
}

/// Enrichment result for one medicine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicineRecord {
    pub name: MedicineName,

    /// Short description of the medicine
    pub description: String,

    /// Dosage / typical duration guidance
    pub dosage: String,

    /// Price as quoted by the source (currency included)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,

    pub availability: Availability,

    /// Source URLs, best candidate first
    pub sources: Vec<String>,

    /// Scraped markdown excerpt, used as context for report generation
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub details: String,

    /// Anomalies noticed while parsing the upstream response
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,

    pub outcome: Outcome,
}

impl MedicineRecord {
    /// A record for a lookup that produced nothing usable.
    pub fn failed(name: MedicineName, reason: impl Into<String>) -> Self {
        Self {
            name,
            description: String::new(),
            dosage: String::new(),
            price: None,
            availability: Availability::Unknown,
            sources: Vec::new(),
            details: String::new(),
            warnings: Vec::new(),
            outcome: Outcome::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }

    /// Failure reason, if the lookup failed.
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// States of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Extracting,
    Enriching,
    Synthesizing,
    Done,
    Failed,
}

impl PipelineState {
    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Extracting)
                | (Extracting, Enriching)
                | (Extracting, Failed)
                | (Enriching, Synthesizing)
                | (Synthesizing, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Idle => "idle",
            PipelineState::Extracting => "extracting",
            PipelineState::Enriching => "enriching",
            PipelineState::Synthesizing => "synthesizing",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Severity of a progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A timestamped line of the processing log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub timestamp: DateTime<Utc>,
    /// Pipeline state the event was emitted in
    pub state: PipelineState,
    pub level: LogLevel,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(state: PipelineState, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            state,
            level,
            message: message.into(),
        }
    }

    pub fn info(state: PipelineState, message: impl Into<String>) -> Self {
        Self::new(state, LogLevel::Info, message)
    }

    pub fn warn(state: PipelineState, message: impl Into<String>) -> Self {
        Self::new(state, LogLevel::Warn, message)
    }

    pub fn error(state: PipelineState, message: impl Into<String>) -> Self {
        Self::new(state, LogLevel::Error, message)
    }
}

/// A chunk of report text, appended to everything emitted before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFragment {
    pub text: String,
}

impl ReportFragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// One item of the orchestrator's output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PipelineEvent {
    Progress(ProgressEvent),
    Fragment(ReportFragment),
}

/// Accumulates fragments into the report text seen so far.
#[derive(Debug, Clone, Default)]
pub struct Report {
    text: String,
    fragments: usize,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &ReportFragment) {
        self.text.push_str(&fragment.text);
        self.fragments += 1;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Result of tolerantly parsing an upstream response.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    /// The response had exactly the expected shape
    Full(T),
    /// Something usable was recovered; `warnings` describe what was off
    Partial { value: T, warnings: Vec<String> },
    /// Nothing usable could be read
    Unparseable(String),
}

impl<T> ParseOutcome<T> {
    /// The recovered value, if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            ParseOutcome::Full(value) | ParseOutcome::Partial { value, .. } => Some(value),
            ParseOutcome::Unparseable(_) => None,
        }
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            ParseOutcome::Partial { warnings, .. } => warnings,
            _ => &[],
        }
    }
}
