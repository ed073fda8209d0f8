use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pharma_supply_sim::config::{BucketingMode, JourneyStrategy, SimulationConfig};
use pharma_supply_sim::models::SupplyPath;
use pharma_supply_sim::regression::fit_standardized_ols;
use pharma_supply_sim::reporting::{display_regression_fit, display_summary, write_table_jsonl};
use pharma_supply_sim::{collect_regression_dataset, run_monte_carlo};

#[derive(Parser)]
#[command(name = "pharma-supply-sim", about = "Counterfeit and loss risk in pharmaceutical supply chains")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Average class fractions and on-time rates over many runs
    Summary(SummaryArgs),
    /// Build per-run datasets and regress missing fraction on stage probabilities
    Regression(RegressionArgs),
}

#[derive(Args)]
struct SweepArgs {
    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of Monte Carlo runs
    #[arg(long)]
    num_sims: Option<usize>,
    /// Shipments simulated per run
    #[arg(long)]
    shipments: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Supply paths to simulate (repeatable)
    #[arg(long = "path", value_enum)]
    paths: Vec<SupplyPath>,
}

#[derive(Args)]
struct SummaryArgs {
    #[command(flatten)]
    sweep: SweepArgs,
    #[arg(long, value_enum)]
    mode: Option<BucketingMode>,
    #[arg(long, value_enum)]
    strategy: Option<JourneyStrategy>,
    /// Print the summary as JSON instead of the console report
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct RegressionArgs {
    #[command(flatten)]
    sweep: SweepArgs,
    /// Directory to write imported.jsonl / local.jsonl datasets into
    #[arg(long)]
    dataset_out: Option<PathBuf>,
}

impl SweepArgs {
    fn load_config(&self) -> anyhow::Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::from_json_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => SimulationConfig::default(),
        };
        if let Some(num_sims) = self.num_sims {
            config.num_sims = num_sims;
        }
        if let Some(shipments) = self.shipments {
            config.shipments_per_run = shipments;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if !self.paths.is_empty() {
            config.paths = self.paths.clone();
        }
        Ok(config)
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pharma_supply_sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_summary(args: SummaryArgs) -> anyhow::Result<()> {
    let mut config = args.sweep.load_config()?;
    if let Some(mode) = args.mode {
        config.bucketing = mode;
    }
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }

    let summary = run_monte_carlo(&config).context("running Monte Carlo sweep")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        display_summary(&summary);
    }
    Ok(())
}

fn run_regression(args: RegressionArgs) -> anyhow::Result<()> {
    let config = args.sweep.load_config()?;
    let dataset = collect_regression_dataset(&config).context("collecting regression dataset")?;

    if let Some(dir) = &args.dataset_out {
        for table in &dataset.tables {
            let path = dir.join(format!("{}.jsonl", table.path));
            write_table_jsonl(table, &path).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), rows = table.rows.len(), "dataset written");
        }
    }

    for table in &dataset.tables {
        let fit = fit_standardized_ols(table).with_context(|| format!("fitting {} regression", table.path))?;
        display_regression_fit(&fit);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Summary(args) => run_summary(args),
        Command::Regression(args) => run_regression(args),
    }
}
