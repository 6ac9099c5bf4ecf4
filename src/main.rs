use anyhow::{Context, Result};
use clap::Parser;
use jar_inliner::cli::{Cli, Commands};
use jar_inliner::config::InlineConfig;
use jar_inliner::sink::ZipSink;
use jar_inliner::stages::StageRegistry;
use jar_inliner::transform::Transformer;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Inline { inputs, output } => {
            let mut config = InlineConfig::from_args(&inputs)?;
            if output.is_some() {
                config.output = output;
            }
            let result = inline(&config)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Plan { inputs } => {
            let config = InlineConfig::from_args(&inputs)?;
            let registry = StageRegistry::default();
            config.validate(&registry)?;
            let transformer = Transformer::with_registry(config.transform_options(), registry);
            let plan = transformer.plan(&config.class_path()?)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[derive(Debug, Serialize)]
struct InlineResult {
    output: String,
    duration_ms: u64,
    #[serde(flatten)]
    summary: jar_inliner::transform::TransformSummary,
}

fn inline(config: &InlineConfig) -> Result<InlineResult> {
    let registry = StageRegistry::default();
    config.validate(&registry)?;
    let output: PathBuf = config
        .output
        .clone()
        .context("No output archive: pass -o/--output or set \"output\" in the config")?;

    let start = Instant::now();
    let class_path = config.class_path()?;
    let transformer = Transformer::with_registry(config.transform_options(), registry);

    let mut sink = ZipSink::create(&output)
        .with_context(|| format!("Failed to create output archive: {}", output.display()))?;
    let summary = match transformer.transform(&class_path, &mut sink) {
        Ok(summary) => summary,
        Err(err) => {
            drop(sink);
            let _ = std::fs::remove_file(&output);
            return Err(err).context("Transform failed");
        }
    };
    sink.finish()
        .with_context(|| format!("Failed to finish output archive: {}", output.display()))?;

    Ok(InlineResult {
        output: output.to_string_lossy().to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
        summary,
    })
}
