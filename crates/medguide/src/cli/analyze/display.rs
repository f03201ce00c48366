//! Terminal rendering of progress events: spinner and processing log.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use medguide_core::{LogLevel, PipelineState, ProgressEvent};
use std::time::Duration;

/// Create the spinner shown on stderr while a run is in progress.
pub fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {prefix:.bold.cyan} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(stage_label(PipelineState::Idle));
    pb.set_message("starting...");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Short label for the spinner prefix.
pub fn stage_label(state: PipelineState) -> &'static str {
    match state {
        PipelineState::Idle => "Starting",
        PipelineState::Extracting => "Reading",
        PipelineState::Enriching => "Looking up",
        PipelineState::Synthesizing => "Writing",
        PipelineState::Done => "Done",
        PipelineState::Failed => "Failed",
    }
}

/// One styled line of the processing log.
pub fn log_line(event: &ProgressEvent) -> String {
    let marker = match event.level {
        LogLevel::Info => style("•").for_stderr().cyan(),
        LogLevel::Warn => style("!").for_stderr().yellow(),
        LogLevel::Error => style("✗").for_stderr().red(),
    };
    let time = style(event.timestamp.format("%H:%M:%S").to_string())
        .for_stderr()
        .dim();
    format!("  {time} {marker} {}", event.message)
}

/// Closing line once the run has ended.
pub fn summary_line(state: PipelineState, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    match state {
        PipelineState::Done => format!(
            "{} Completed in {secs:.2} seconds",
            style("✓").for_stderr().green()
        ),
        _ => format!(
            "{} Stopped after {secs:.2} seconds",
            style("✗").for_stderr().red()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_line_contains_message() {
        let event = ProgressEvent::warn(PipelineState::Enriching, "Partial details for X");
        let line = console::strip_ansi_codes(&log_line(&event)).to_string();
        assert!(line.contains("! Partial details for X"));
    }

    #[test]
    fn summary_line_reports_elapsed_seconds() {
        let line = summary_line(PipelineState::Done, Duration::from_millis(12_340));
        let line = console::strip_ansi_codes(&line).to_string();
        assert!(line.ends_with("Completed in 12.34 seconds"));

        let line = summary_line(PipelineState::Failed, Duration::from_secs(1));
        assert!(console::strip_ansi_codes(&line).contains("Stopped after"));
    }

    #[test]
    fn every_state_has_a_label() {
        for state in [
            PipelineState::Idle,
            PipelineState::Extracting,
            PipelineState::Enriching,
            PipelineState::Synthesizing,
            PipelineState::Done,
            PipelineState::Failed,
        ] {
            assert!(!stage_label(state).is_empty());
        }
    }
}
