//! Walk-forward evaluation CLI.
//!
//! # Usage
//!
//! ```bash
//! # Evaluate exported features, write out-of-sample predictions
//! walkforward-ml run --features tmp/features.json --output tmp/predictions_oos.json
//!
//! # Override ratios and run folds in parallel
//! walkforward-ml run --features tmp/features.jsonl --config config/default.toml \
//!     --train-ratio 0.5 --test-ratio 0.1 --parallel
//!
//! # Dry run: print the windows for a dataset size
//! walkforward-ml schedule --rows 4928
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use walkforward_ml::data::{write_predictions, FeatureStore};
use walkforward_ml::walkforward::FoldStatus;
use walkforward_ml::{WalkForwardConfig, WalkForwardEngine};

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "walkforward-ml")]
#[command(about = "Walk-forward out-of-sample evaluation of a market-direction classifier")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Overrides {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fraction of rows per fold used for training
    #[arg(long)]
    train_ratio: Option<f64>,

    /// Fraction of rows per fold used for testing
    #[arg(long)]
    test_ratio: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run walk-forward evaluation and write out-of-sample predictions
    Run {
        /// Feature records (JSON array or JSON lines)
        #[arg(short, long)]
        features: PathBuf,

        /// Output path for predictions
        #[arg(short, long, default_value = "tmp/predictions_oos.json")]
        output: PathBuf,

        /// Optional path for the full JSON report
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,

        /// Decision threshold on the positive-class probability
        #[arg(long)]
        threshold: Option<f64>,

        /// Classifier seed
        #[arg(long)]
        seed: Option<u64>,

        /// Number of trees in the ensemble
        #[arg(long)]
        trees: Option<usize>,

        /// Run folds in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Print the fold windows for a dataset size without training
    Schedule {
        /// Number of feature rows
        #[arg(long)]
        rows: usize,

        #[command(flatten)]
        overrides: Overrides,
    },
}

fn load_config(overrides: &Overrides) -> Result<WalkForwardConfig> {
    let mut config = match &overrides.config {
        Some(path) => WalkForwardConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => WalkForwardConfig::default(),
    };
    if let Some(ratio) = overrides.train_ratio {
        config.train_ratio = ratio;
    }
    if let Some(ratio) = overrides.test_ratio {
        config.test_ratio = ratio;
    }
    Ok(config)
}

fn cmd_run(
    features: PathBuf,
    output: PathBuf,
    report_path: Option<PathBuf>,
    config: WalkForwardConfig,
) -> Result<()> {
    let store = FeatureStore::load(&features)
        .with_context(|| format!("Failed to load features from {}", features.display()))?;

    let engine = WalkForwardEngine::from_config(config);
    let report = engine.run(store.records())?;

    println!("{}", SEPARATOR);
    println!("{}", report.summary());
    println!("{}", SEPARATOR);
    for fold in &report.folds {
        match &fold.status {
            FoldStatus::Succeeded => println!(
                "Fold {:>3}: train [{}, {}) test [{}, {}) positives {}/{}",
                fold.fold, fold.train.start, fold.train.end, fold.test.start, fold.test.end, fold.positives, fold.predictions
            ),
            FoldStatus::Skipped { reason } => println!(
                "Fold {:>3}: train [{}, {}) test [{}, {}) SKIPPED: {}",
                fold.fold, fold.train.start, fold.train.end, fold.test.start, fold.test.end, reason
            ),
        }
    }

    write_predictions(&output, &report.predictions)
        .with_context(|| format!("Failed to write predictions to {}", output.display()))?;
    println!("Saved {} predictions to {}", report.total_predictions, output.display());

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "config": engine.config(),
            "report": report,
        }))?;
        fs::write(&path, json).with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Saved report to {}", path.display());
    }

    Ok(())
}

fn cmd_schedule(rows: usize, config: WalkForwardConfig) -> Result<()> {
    let engine = WalkForwardEngine::from_config(config);
    let schedule = engine.schedule(rows)?;

    println!(
        "{} folds over {} rows (train {}, test {})",
        schedule.len(),
        rows,
        schedule.train_len(),
        schedule.test_len()
    );
    for window in schedule.windows() {
        println!(
            "Fold {:>3}: train [{}, {}) test [{}, {})",
            window.fold, window.train.start, window.train.end, window.test.start, window.test.end
        );
    }
    println!(
        "Rows with no signal: {} leading, {} tail",
        schedule.leading_rows(),
        schedule.tail_rows()
    );
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("walkforward_ml=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            features,
            output,
            report,
            overrides,
            threshold,
            seed,
            trees,
            parallel,
        } => {
            let mut config = load_config(&overrides)?;
            if let Some(threshold) = threshold {
                config.decision_threshold = threshold;
            }
            if let Some(seed) = seed {
                config.classifier.seed = seed;
            }
            if let Some(trees) = trees {
                config.classifier.size = trees;
            }
            config.parallel |= parallel;
            cmd_run(features, output, report, config)?;
        }
        Commands::Schedule { rows, overrides } => {
            let config = load_config(&overrides)?;
            cmd_schedule(rows, config)?;
        }
    }

    Ok(())
}
