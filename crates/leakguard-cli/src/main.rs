//! Leakguard CLI
//!
//! Classifies and evaluates a stream of newline-delimited JSON events
//! against a directory of DLP policies, printing each augmented event.
//!
//! ```text
//! leakguard --config leakguard.yaml --policies ./policies --input events.ndjson
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use leakguard_classifiers::ContentClassifier;
use leakguard_core::Error;
use leakguard_policy::{EventProcessor, PolicyEngine};
use leakguard_telemetry::describe_metrics;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

mod config;

use config::{LeakguardConfig, LogFormat};

#[derive(Parser, Debug)]
#[command(name = "leakguard")]
#[command(about = "Leakguard DLP classification and policy evaluation", long_about = None)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "LEAKGUARD_CONFIG", default_value = "leakguard.yaml")]
    config: PathBuf,

    /// Policy directory
    #[arg(short, long, env = "LEAKGUARD_POLICIES")]
    policies: Option<PathBuf>,

    /// NDJSON event file; reads stdin when omitted or `-`
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Dot path of the content to classify
    #[arg(long)]
    content_field: Option<String>,

    /// Replace sensitive content with a redacted copy
    #[arg(long)]
    redact: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = LeakguardConfig::load(&cli.config, &cli)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    init_tracing(cli.verbose, config.log_format);
    describe_metrics();

    info!("Starting Leakguard");
    info!("Policies: {}", config.policies_dir.display());

    let processor = build_processor(&config)?;

    let summary = match cli.input.as_ref().filter(|path| path.as_os_str() != "-") {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            run(&processor, BufReader::new(file), tokio::io::stdout()).await?
        }
        None => run(&processor, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?,
    };

    let metrics = processor.metrics().snapshot();
    let audit = processor.audit();
    info!(
        lines = summary.lines,
        processed = summary.processed,
        skipped = summary.skipped,
        blocked = summary.blocked,
        policy_matches = metrics.policy_matches,
        action_failures = metrics.action_failures,
        avg_classification_us = metrics.avg_classification_latency_us(),
        audit_records = audit.len(),
        audit_evicted = audit.evicted(),
        "Evaluation complete"
    );

    Ok(())
}

/// Initialize tracing/logging on stderr, keeping stdout for events
fn init_tracing(verbose: bool, format: LogFormat) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("leakguard=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("leakguard=info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

/// Build the classifier, engine and processor from configuration
fn build_processor(config: &LeakguardConfig) -> Result<EventProcessor> {
    let classifier = ContentClassifier::from_config(config.classifier.clone())
        .context("failed to build content classifier")?;

    let engine = PolicyEngine::from_config(&config.tracker);
    let report = engine
        .load_dir(&config.policies_dir)
        .with_context(|| format!("failed to read policies from {}", config.policies_dir.display()))?;

    for rejected in &report.rejected {
        warn!(policy = %rejected.policy_id, reason = %rejected.reason, "Policy rejected");
    }
    info!(loaded = report.loaded, rejected = report.rejected.len(), "Policies loaded");

    let processor = EventProcessor::new(Arc::new(classifier), Arc::new(engine), config.processor.clone())?;
    Ok(processor)
}

/// Counters for one run over an input stream
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct RunSummary {
    lines: u64,
    processed: u64,
    skipped: u64,
    blocked: u64,
}

/// Process every line of `input`, writing augmented events to `output`.
///
/// Unparsable lines and invalid events are skipped with a warning.
async fn run<R, W>(processor: &EventProcessor, input: R, mut output: W) -> Result<RunSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut summary = RunSummary::default();
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        summary.lines += 1;

        let event: Value = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = summary.lines, error = %e, "Skipping unparsable line");
                summary.skipped += 1;
                continue;
            }
        };

        let processed = match processor.process(event).await {
            Ok(processed) => processed,
            Err(e @ Error::InvalidEvent(_)) => {
                warn!(line = summary.lines, error = %e, "Skipping invalid event");
                summary.skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        summary.processed += 1;
        if processed.is_blocked() {
            summary.blocked += 1;
        }
        debug!(line = summary.lines, matches = processed.matches.len(), "Event evaluated");

        let mut encoded = serde_json::to_vec(&processed.event)?;
        encoded.push(b'\n');
        output.write_all(&encoded).await?;
    }

    output.flush().await?;
    Ok(summary)
}
