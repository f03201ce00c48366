//! MedGuide CLI - read a prescription photo and report on every medicine in it.
//!
//! The photo is read by a vision LLM, each medicine is looked up on the web
//! concurrently, and a markdown report with descriptions, typical duration,
//! prices, availability and purchase links is streamed to stdout.
//!
//! # Usage
//!
//! ```bash
//! # Analyze a prescription, report on stdout
//! medguide analyze prescription.jpg
//!
//! # Save the report, show the processing log, use OpenAI
//! medguide analyze rx.png --output report.md --show-log --llm openai
//!
//! # View configuration
//! medguide config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// MedGuide - prescription analysis with price and availability lookup.
#[derive(Parser, Debug)]
#[command(name = "medguide")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a prescription photo and write a medicine report
    Analyze(cli::analyze::AnalyzeArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match medguide_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `medguide config path`."
            );
            medguide_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("MedGuide v{}", medguide_core::VERSION);

    match cli.command {
        Commands::Analyze(args) => cli::analyze::execute(args).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
