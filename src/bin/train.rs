//! Train a valuation model from a CSV and write the paired artifacts.
//!
//! ```text
//! train --data train.csv --model model.json --processor processor.json --tune
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use valora::{format_dollars, GbrtParams, ModelTrainer, TrainOptions};

#[derive(Debug, Parser)]
#[command(name = "train", about = "Train a property valuation model")]
struct Args {
    /// Training data CSV, including the SalePrice column.
    #[arg(long)]
    data: PathBuf,

    /// Where to write the model artifact.
    #[arg(long, default_value = "model.json")]
    model: PathBuf,

    /// Where to write the encoder artifact.
    #[arg(long, default_value = "processor.json")]
    processor: PathBuf,

    /// Run the hyperparameter grid search before the final fit.
    #[arg(long)]
    tune: bool,

    /// Seed for the split, subsampling, and fold assignment.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Fraction of rows held out for validation.
    #[arg(long, default_value_t = 0.2)]
    validation_fraction: f64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let options = TrainOptions::builder()
        .tune(args.tune)
        .seed(args.seed)
        .validation_fraction(args.validation_fraction)
        .params(GbrtParams::builder().seed(args.seed).build())
        .build();

    let report = ModelTrainer::new()
        .train_files(&args.data, &args.model, &args.processor, &options)
        .with_context(|| format!("training from {}", args.data.display()))?;

    println!("Validation metrics (dollar scale):");
    println!("  RMSE  {}", format_dollars(report.rmse));
    println!("  MAE   {}", format_dollars(report.mae));
    println!("  R2    {:.4}", report.r2);
    println!("  MAPE  {:.2}%", report.mape);
    if report.cv_rmse_mean > 0.0 {
        println!(
            "  CV RMSE (log scale)  {:.4} +/- {:.4}",
            report.cv_rmse_mean, report.cv_rmse_std
        );
    }

    println!("Top features by gain:");
    for f in report.importance.iter().take(10) {
        println!("  {:<24} {:.4}", f.name, f.importance);
    }
    Ok(())
}
