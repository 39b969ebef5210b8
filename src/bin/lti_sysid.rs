use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lti_sysid::io::{
    ensure_outdir, results_file_name, write_results_csv, write_summary_json, RunSummary,
    OUTPUT_SCHEMA_VERSION,
};
use lti_sysid::{run_sweep, ExperimentPlan, TrialPool};

#[derive(Debug, Parser)]
#[command(name = "lti-sysid")]
#[command(about = "Monte Carlo comparison of ERM and OLS identification over a finite LTI class")]
struct Cli {
    /// Reference experiment (1, 2 or 3)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3), required_unless_present = "config", conflicts_with = "config")]
    exp: Option<u8>,

    /// TOML experiment plan
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory receiving the results table and run summary
    #[arg(long, default_value = "data")]
    outdir: PathBuf,

    /// Trials per horizon
    #[arg(long)]
    runs: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Comma-separated horizons, e.g. `10,20`
    #[arg(long, value_delimiter = ',')]
    horizons: Option<Vec<usize>>,

    /// Failure probability used by both sample-size conditions
    #[arg(long)]
    delta: Option<f64>,

    /// Worker threads (defaults to one per core)
    #[arg(long)]
    threads: Option<usize>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn resolve_plan(cli: &Cli) -> Result<ExperimentPlan> {
    let mut plan = match (&cli.config, cli.exp) {
        (Some(path), _) => ExperimentPlan::from_toml_file(path)
            .with_context(|| format!("failed to load experiment plan: {}", path.display()))?,
        (None, Some(exp)) => ExperimentPlan::preset(exp)?,
        (None, None) => ExperimentPlan::default(),
    };

    if let Some(runs) = cli.runs {
        plan.runs = runs;
    }
    if let Some(seed) = cli.seed {
        plan.seed = seed;
    }
    if let Some(horizons) = &cli.horizons {
        plan.horizons = horizons.clone();
    }
    if let Some(delta) = cli.delta {
        plan.delta = delta;
    }
    if cli.threads.is_some() {
        plan.threads = cli.threads;
    }
    plan.validate().context("invalid experiment plan")?;
    Ok(plan)
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let plan = resolve_plan(&cli)?;

    let pool = TrialPool::new(plan.threads).context("failed to build trial pool")?;
    info!(
        name = %plan.name,
        horizons = ?plan.horizons,
        runs = plan.runs,
        delta = plan.delta,
        seed = plan.seed,
        threads = pool.threads(),
        "starting sweep"
    );

    let rows = run_sweep(&plan, &pool)?;

    ensure_outdir(&cli.outdir)
        .with_context(|| format!("failed to create output directory: {}", cli.outdir.display()))?;
    let today = chrono::Local::now().date_naive();
    let file_name = results_file_name(&plan, today);
    let csv_path = cli.outdir.join(&file_name);
    write_results_csv(&csv_path, &rows, plan.systems.len())
        .with_context(|| format!("failed to write results: {}", csv_path.display()))?;

    let summary_path = csv_path.with_extension("json");
    let summary = RunSummary {
        schema_version: OUTPUT_SCHEMA_VERSION.to_string(),
        created: today.format("%Y-%m-%d").to_string(),
        threads: pool.threads(),
        results_file: file_name,
        plan,
        rows,
    };
    write_summary_json(&summary_path, &summary)
        .with_context(|| format!("failed to write summary: {}", summary_path.display()))?;

    info!(
        results = %csv_path.display(),
        summary = %summary_path.display(),
        "run complete"
    );
    Ok(())
}
