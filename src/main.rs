use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tick_dataset::config::{Config, LoggingConfig};
use tick_dataset::data_store;
use tick_dataset::dataset::DatasetMode;
use tick_dataset::metrics::evaluate_predictions;
use tick_dataset::model::TickPanel;
use tick_dataset::pipeline::{self, PipelineConfig};
use tick_dataset::standardizer::Standardizer;

const TARGET_STATS_FILE: &str = "target_standardizer.json";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// TOML config; defaults to $TICK_DATASET_CONFIG or config/default.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build targets and rolling features from raw intraday/daily files.
    Build {
        /// Data root containing intraday_data/ and daily_data/.
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// First day to read (YYYY-MM-DD).
        #[arg(long)]
        start: NaiveDate,
        /// Last day to read (YYYY-MM-DD), inclusive.
        #[arg(long)]
        end: NaiveDate,
        /// Write features only, without the target column.
        #[arg(long, default_value_t = false)]
        inference: bool,
    },
    /// Score stored predictions against a stored training dataset.
    Evaluate {
        /// Directory of per-day dataset files.
        #[arg(long)]
        input: PathBuf,
        /// CSV with Id, Timestamp, Prediction columns.
        #[arg(long)]
        predictions: PathBuf,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
}

fn init_tracing(cfg: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match (&cfg.file, cfg.json) {
        (Some(path), json) => {
            let log_file = std::fs::File::create(path)
                .with_context(|| format!("failed to create log file {}", path))?;
            let builder = builder.with_writer(log_file).with_ansi(false);
            if json {
                builder.json().init();
            } else {
                builder.init();
            }
        }
        (None, true) => builder.with_writer(std::io::stderr).json().init(),
        (None, false) => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn build(
    config: &Config,
    input: &Path,
    output: &Path,
    start: NaiveDate,
    end: NaiveDate,
    inference: bool,
) -> Result<()> {
    let cfg = PipelineConfig::from_config(config)?;
    let mode = if inference {
        DatasetMode::Inference
    } else {
        DatasetMode::Training
    };

    let records = data_store::read_raw(input, start, end)?;
    let panel = TickPanel::from_records(records)?;
    let mut out = pipeline::run(&panel, &cfg, mode)?;

    if config.output.standardize_target && mode == DatasetMode::Training {
        let targets = out.dataset.target_series();
        let standardizer = Standardizer::fit(&targets);
        out.dataset.set_targets(&standardizer.transform(&targets));
        let stats_path = output.join(TARGET_STATS_FILE);
        standardizer
            .save(&stats_path)
            .with_context(|| format!("failed to write {}", stats_path.display()))?;
        tracing::info!(path = %stats_path.display(), "Target standardized");
    }

    let files = data_store::store_dataset(output, &out.dataset)?;
    println!(
        "wrote {} rows across {} day files to {}",
        out.dataset.len(),
        files,
        output.display()
    );
    Ok(())
}

fn evaluate(input: &Path, predictions: &Path, start: NaiveDate, end: NaiveDate) -> Result<()> {
    let rows = data_store::read_processed(input, start, end)?;
    let preds = data_store::read_predictions(predictions)?;
    let evaluation = evaluate_predictions(&rows, &preds)
        .context("no scorable rows: predictions and targets do not overlap")?;
    tracing::info!(rows = evaluation.rows, r2 = evaluation.r2, "Predictions evaluated");
    println!("Weighted R2 is {}", evaluation.r2);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("failed to load config")?;
    init_tracing(&config.logging)?;

    match args.command {
        Command::Build {
            input,
            output,
            start,
            end,
            inference,
        } => build(&config, &input, &output, start, end, inference),
        Command::Evaluate {
            input,
            predictions,
            start,
            end,
        } => evaluate(&input, &predictions, start, end),
    }
}
