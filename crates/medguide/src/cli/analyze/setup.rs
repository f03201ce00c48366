//! Pipeline setup: config overrides and client construction.

use medguide_core::{Config, MedGuideError, Pipeline, UpstreamError};

use super::AnalyzeArgs;

/// Validate input, load config, apply CLI overrides and build the pipeline.
pub fn setup_pipeline(args: &AnalyzeArgs) -> anyhow::Result<Pipeline> {
    if !args.image.is_file() {
        anyhow::bail!(
            "Image not found: {:?}\n\n  Hint: Pass the path to a JPEG, PNG, WebP or GIF photo of the prescription.",
            args.image
        );
    }

    let mut config = Config::load()?;
    apply_overrides(&mut config, args);
    config.validate()?;

    tracing::debug!(
        provider = %config.extraction.provider,
        parallel = config.enrichment.parallel,
        summarize = config.report.summarize,
        "Configuration resolved"
    );

    let pipeline = Pipeline::from_config(&config).map_err(|e| match e {
        MedGuideError::Upstream(UpstreamError::NotConfigured(msg)) => anyhow::anyhow!(
            "{msg}\n\n  Hint: Export the key, or point the config at it with `medguide config path`."
        ),
        other => other.into(),
    })?;

    Ok(pipeline)
}

/// Fold command-line flags into the loaded configuration.
pub(crate) fn apply_overrides(config: &mut Config, args: &AnalyzeArgs) {
    if let Some(parallel) = args.parallel {
        config.enrichment.parallel = parallel;
    }
    if let Some(provider) = args.llm {
        config.extraction.provider = provider.to_string();
        // A model name belongs to one provider; drop the configured one.
        config.extraction.model.clear();
    }
    if let Some(ref model) = args.llm_model {
        config.extraction.model = model.clone();
    }
    if args.no_summary {
        config.report.summarize = false;
    }
}
