#![warn(missing_docs)]
//! llmperf CLI Library
//!
//! Command-line surface of llmperf: configuration, dataset loading, the
//! OpenAI-compatible transport, sweep coordination and report output.
//!
//! # Example
//!
//! ```ignore
//! fn main() -> anyhow::Result<()> {
//!     llmperf_cli::run()
//! }
//! ```

mod config;
mod dataset;
mod output;
mod provider;
mod sweep;

pub use config::*;
pub use dataset::{
    DatasetError, apply_system_prompt, load_dataset, parse_jsonl, resolve_system_prompt,
};
pub use output::{
    DEFAULT_REPORT_STEM, ReportTarget, batch_result_line, resolve_report_target,
    write_batch_results, write_report,
};
pub use provider::{
    OPENAI_ENDPOINT, OpenAiProvider, QWEN_ENDPOINT, build_provider, read_event_stream,
};
pub use sweep::Sweep;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use llmperf_core::{Engine, RequestExecutor, RequestResult};
use llmperf_report::{ConcurrentComparison, ReportMeta, RunMode, SweepReport, format_human_report};
use tracing::{info, warn};

/// llmperf CLI arguments
#[derive(Parser, Debug)]
#[command(name = "llmperf")]
#[command(author, version, about = "llmperf - load generator for LLM completion endpoints")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Explicit log filter directive (e.g., "llmperf=trace"), overrides --verbose
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a load test (stress mode unless --batch)
    Run(RunArgs),
    /// Write a default configuration file
    Generate {
        /// Destination of the configuration
        #[arg(default_value = CONFIG_FILE_NAME)]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Arguments of `llmperf run`
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Configuration file (discovered from the working directory if omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Send every dataset case exactly once per level instead of a timed stress run
    #[arg(long)]
    pub batch: bool,

    /// Sweep the levels of test.perf_concurrency_group
    #[arg(long)]
    pub perf: bool,

    /// Skip writing the report file
    #[arg(long)]
    pub no_report: bool,

    /// Batch mode: write per-case raw responses (JSONL) to this file
    #[arg(long)]
    pub batch_result: Option<String>,

    /// Provider: openai or qwen
    #[arg(short = 'P', long)]
    pub provider: Option<String>,

    /// Model name
    #[arg(short, long)]
    pub model: Option<String>,

    /// Dataset file
    #[arg(short, long)]
    pub dataset: Option<String>,

    /// API key
    #[arg(short = 'k', long)]
    pub api_key: Option<String>,

    /// Endpoint URL
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Report file
    #[arg(short, long)]
    pub report: Option<String>,

    /// Report format: json, csv, human
    #[arg(short, long)]
    pub format: Option<String>,
}

impl RunArgs {
    /// Flag values that replace configuration file values
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            provider: self.provider.clone(),
            model: self.model.clone(),
            dataset: self.dataset.clone(),
            api_key: self.api_key.clone(),
            endpoint: self.endpoint.clone(),
            report_path: self.report.clone(),
            report_format: self.format.clone(),
        }
    }

    /// Execution mode selected by the flags
    pub fn mode(&self) -> RunMode {
        if self.batch {
            RunMode::Batch
        } else {
            RunMode::Stress
        }
    }
}

/// Run the llmperf CLI with the process arguments.
///
/// # Returns
/// Returns `Ok(())` on success, or an error if something goes wrong.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the llmperf CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    init_tracing(cli.verbose, cli.log_level.as_deref());

    match cli.command {
        Commands::Run(args) => run_load_test(&args),
        Commands::Generate { path, force } => generate_config(&path, force),
    }
}

fn init_tracing(verbose: bool, log_level: Option<&str>) {
    let filter = match log_level {
        Some(directive) => directive,
        None if verbose => "llmperf=debug",
        None => "llmperf=info",
    };
    // Already installed when embedded in a host binary
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Write the default configuration to `path`
pub fn generate_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    std::fs::write(path, LlmPerfConfig::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Load, override and validate the configuration of a run
pub fn resolve_config(args: &RunArgs) -> anyhow::Result<LlmPerfConfig> {
    let mut config = match &args.config {
        Some(path) => LlmPerfConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => LlmPerfConfig::discover().with_context(|| {
            format!(
                "No {} found; pass --config or run `llmperf generate`",
                CONFIG_FILE_NAME
            )
        })?,
    };
    config.apply_overrides(&args.overrides());
    config.validate()?;
    Ok(config)
}

fn run_load_test(args: &RunArgs) -> anyhow::Result<()> {
    let config = resolve_config(args)?;
    let mode = args.mode();
    let levels = config.concurrency_levels(args.perf);

    let system_prompt = resolve_system_prompt(&config.model.system_prompt)?;
    let dataset = load_dataset(
        &config.dataset.path,
        &config.dataset.kind,
        system_prompt.as_deref(),
    )
    .with_context(|| format!("Failed to load dataset {}", config.dataset.path))?;
    info!(
        target: "llmperf::cli",
        cases = dataset.len(),
        mode = ?mode,
        levels = ?levels,
        "Starting run"
    );

    let sender = build_provider(
        &config.model.provider,
        &config.model.api_key,
        &config.model.endpoint,
        config.request_timeout()?,
    )?;
    let executor = RequestExecutor::new(sender, config.priority_params(), config.headers());

    let engine_config = config.engine_config()?;
    let progress = progress_bar(
        mode,
        &levels,
        dataset.len(),
        engine_config.requests_per_worker,
    );
    let hook_progress = progress.clone();
    let engine = Engine::new(executor, engine_config)
        .with_result_hook(Arc::new(move |_: &RequestResult| hook_progress.inc(1)));

    let batch_result_path = args
        .batch_result
        .clone()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| config.output.batch_result_path.clone());
    if !batch_result_path.is_empty() && mode == RunMode::Stress {
        warn!(target: "llmperf::cli", "Batch result file is ignored in stress mode");
    }

    let report_target = if args.no_report {
        None
    } else {
        resolve_report_target(&config.output.path, &config.output.format)?
    };
    if report_target.is_none() && !args.no_report {
        info!(target: "llmperf::cli", "No report path or format configured");
    }
    let thresholds = config.bottleneck.thresholds();
    let build_report = |comparison: &ConcurrentComparison| {
        let meta = ReportMeta::new(&config.model.provider, config.model_name(), mode);
        SweepReport::build(meta, comparison, &thresholds)
    };

    let mut sweep = Sweep::new(engine, mode);
    sweep.run(&levels, &dataset, |concurrency, collector, recorded| {
        progress.println(format!(
            "concurrency {}: {} requests, {} failed",
            concurrency,
            collector.total_count(),
            collector.failure_count()
        ));
        if mode == RunMode::Batch && !batch_result_path.is_empty() {
            write_batch_results(collector.results(), &batch_result_path)
                .with_context(|| format!("Failed to write batch results {}", batch_result_path))?;
        }
        // Rewritten after every level
        if let Some(target) = &report_target {
            write_report(&build_report(recorded), target)?;
        }
        Ok::<_, anyhow::Error>(())
    })?;
    progress.finish_with_message("Complete");

    let report = build_report(sweep.comparison());
    println!("{}", format_human_report(&report));
    if let Some(target) = &report_target {
        println!("Report written to {}", target.path.display());
    }
    Ok(())
}

/// Progress over the whole sweep: a bar when the request count is known
/// up front, a spinner otherwise
fn progress_bar(mode: RunMode, levels: &[usize], cases: usize, quota: u64) -> ProgressBar {
    let total = match mode {
        RunMode::Batch => Some((cases * levels.len()) as u64),
        RunMode::Stress if quota > 0 => {
            Some(levels.iter().map(|&level| level.max(1) as u64 * quota).sum())
        }
        RunMode::Stress => None,
    };

    match total {
        Some(len) => {
            let pb = ProgressBar::new(len);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {pos} requests {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    }
}
