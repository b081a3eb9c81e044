//! Train a pilot model from recorded tubs.
//!
//! Usage:
//!   train TUB [TUB ...] [--model PATH] [--base-model PATH]
//!         [--batch-size N] [--train-split F] [--epochs N] [--config config.yml]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use donkey_car::config::CarConfig;
use donkey_car::logging;
use donkey_car::train::{train, TrainOptions};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "train", about = "Train a behavioural cloning pilot")]
struct Args {
    /// Tub directories to train on.
    #[arg(required = true, value_name = "TUBS")]
    tubs: Vec<PathBuf>,

    /// Output model path. Defaults to model_<date>.json.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Model to continue training from.
    #[arg(long)]
    base_model: Option<PathBuf>,

    /// Records per gradient step.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Fraction of records used for training.
    #[arg(long)]
    train_split: Option<f32>,

    #[arg(long)]
    epochs: Option<usize>,

    /// Car config supplying training defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Shuffle seed.
    #[arg(long)]
    seed: Option<u64>,
}

fn default_model_name() -> PathBuf {
    let now = chrono::Local::now();
    PathBuf::from(format!("model_{}.json", now.format("%Y-%m-%d__%H-%M")))
}

fn main() -> Result<()> {
    logging::init(logging::DEFAULT_DIRECTIVE);
    let args = Args::parse();
    info!(?args, "train");

    let config = match &args.config {
        Some(path) => CarConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => CarConfig::default(),
    };

    let mut options = TrainOptions::from_config(
        &config.training,
        args.tubs,
        args.model.unwrap_or_else(default_model_name),
    );
    options.base_model_path = args.base_model;
    options.seed = args.seed;
    if let Some(batch_size) = args.batch_size {
        options.batch_size = batch_size;
    }
    if let Some(train_split) = args.train_split {
        options.train_split = train_split;
    }
    if let Some(epochs) = args.epochs {
        options.epochs = epochs;
    }

    let summary = train(&options).context("training failed")?;
    info!(
        path = %summary.model_path.display(),
        epochs = summary.history.val_loss.len(),
        best_val_loss = ?summary.history.best_val_loss(),
        "Model saved"
    );
    Ok(())
}
