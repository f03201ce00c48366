//! The `medguide analyze` command: run one prescription through the pipeline.

mod display;
mod setup;
pub mod types;

pub use types::{LlmProvider, OutputFormat};

use clap::Args;
use futures_util::StreamExt;
use medguide_core::{LogLevel, PipelineEvent, PipelineState, PipelineStream, ProgressEvent, Report};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use setup::setup_pipeline;

/// Arguments for the `analyze` command.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Photo of the prescription (JPEG, PNG, WebP or GIF)
    #[arg(required = true)]
    pub image: PathBuf,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// What to print on stdout
    #[arg(short, long, value_enum, default_value = "markdown")]
    pub format: OutputFormat,

    /// Maximum concurrent medicine lookups (overrides config)
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// LLM provider for reading the prescription and writing the report
    #[arg(long, value_enum)]
    pub llm: Option<LlmProvider>,

    /// LLM model name (provider-specific)
    #[arg(long)]
    pub llm_model: Option<String>,

    /// Render report blocks from the collected data without an LLM
    #[arg(long)]
    pub no_summary: bool,

    /// Print the processing log to stderr as the run progresses
    #[arg(long)]
    pub show_log: bool,
}

/// Manual Default impl for constructing AnalyzeArgs outside of clap.
impl Default for AnalyzeArgs {
    fn default() -> Self {
        Self {
            image: PathBuf::new(),
            output: None,
            format: OutputFormat::Markdown,
            parallel: None,
            llm: None,
            llm_model: None,
            no_summary: false,
            show_log: false,
        }
    }
}

/// Execute the analyze command.
pub async fn execute(args: AnalyzeArgs) -> anyhow::Result<()> {
    let pipeline = setup_pipeline(&args)?;

    let bytes = tokio::fs::read(&args.image).await?;
    tracing::info!("Analyzing {:?} ({} bytes)", args.image, bytes.len());

    let started = Instant::now();
    let stream = pipeline.run_bytes(bytes)?;
    let outcome = consume(stream, &args).await?;
    let elapsed = started.elapsed();

    eprintln!("{}", display::summary_line(outcome.state, elapsed));

    check_final_state(outcome.state, outcome.last_error)?;

    if let Some(ref path) = args.output {
        std::fs::write(path, outcome.report.into_string())?;
        tracing::info!("Report written to {:?}", path);
        eprintln!("Report written to {}", path.display());
    }

    Ok(())
}

/// A run only counts as finished once it reached `Done`.
fn check_final_state(
    state: PipelineState,
    last_error: Option<ProgressEvent>,
) -> anyhow::Result<()> {
    if state == PipelineState::Done {
        return Ok(());
    }
    if !state.is_terminal() {
        anyhow::bail!(
            "pipeline stopped while {}",
            display::stage_label(state).to_lowercase()
        );
    }
    let reason = last_error
        .map(|e| e.message)
        .unwrap_or_else(|| "pipeline failed".to_string());
    anyhow::bail!("{reason}")
}

struct Outcome {
    state: PipelineState,
    report: Report,
    last_error: Option<ProgressEvent>,
}

/// Drive the event stream: spinner and log on stderr, output on stdout.
async fn consume(mut stream: PipelineStream, args: &AnalyzeArgs) -> anyhow::Result<Outcome> {
    let spinner = display::create_spinner();
    let mut out = std::io::stdout();
    let to_stdout = args.output.is_none();

    let mut outcome = Outcome {
        state: PipelineState::Idle,
        report: Report::new(),
        last_error: None,
    };

    while let Some(event) = stream.next().await {
        if args.format == OutputFormat::Jsonl {
            writeln!(out, "{}", serde_json::to_string(&event)?)?;
        }

        match event {
            PipelineEvent::Progress(progress) => {
                outcome.state = progress.state;
                spinner.set_prefix(display::stage_label(progress.state));
                spinner.set_message(progress.message.clone());
                if args.show_log || progress.state == PipelineState::Failed {
                    spinner.println(display::log_line(&progress));
                }
                if progress.level == LogLevel::Error {
                    outcome.last_error = Some(progress);
                }
            }
            PipelineEvent::Fragment(fragment) => {
                if to_stdout && args.format == OutputFormat::Markdown {
                    spinner.suspend(|| -> std::io::Result<()> {
                        out.write_all(fragment.text.as_bytes())?;
                        out.flush()
                    })?;
                }
                outcome.report.push(&fragment);
            }
        }
    }

    spinner.finish_and_clear();
    if to_stdout && args.format == OutputFormat::Markdown && !outcome.report.is_empty() {
        writeln!(out)?;
    }
    out.flush()?;

    Ok(outcome)
}
