//! Training driver
//!
//! Reads recorded tubs, splits the records into training and validation
//! sets and fits a [`LinearPilot`] to the recorded `user/angle` and
//! `user/throttle` from the `cam/image_array` frames.
//!
//! The best model (lowest validation loss) is written to the output path
//! whenever it improves. Training stops after `epochs`, or earlier when
//! validation loss has not improved for `early_stop_patience` epochs.

use std::path::PathBuf;

use donkey_car_core::mode::ControlSample;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::config::{expand_home, TrainingConfig};
use crate::error::TrainError;
use crate::parts::pilot::{extract_features, LinearHead, LinearPilot};
use crate::tub::{TrainingRecord, TubGroup};

/// Smallest validation improvement that resets early stopping.
pub const MIN_DELTA: f32 = 0.0005;

/// Everything one training run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    pub tubs: Vec<PathBuf>,
    pub new_model_path: PathBuf,
    pub base_model_path: Option<PathBuf>,
    pub batch_size: usize,
    pub train_split: f32,
    pub epochs: usize,
    pub learning_rate: f32,
    pub early_stop_patience: usize,
    /// Shuffle seed. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl TrainOptions {
    /// Options with the hyper-parameters taken from the car config.
    pub fn from_config(config: &TrainingConfig, tubs: Vec<PathBuf>, new_model_path: PathBuf) -> Self {
        Self {
            tubs,
            new_model_path,
            base_model_path: None,
            batch_size: config.batch_size,
            train_split: config.train_split,
            epochs: config.epochs,
            learning_rate: config.learning_rate,
            early_stop_patience: config.early_stop_patience,
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<(), TrainError> {
        if self.tubs.is_empty() {
            return Err(TrainError::NoTubs);
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1"));
        }
        if !(self.train_split > 0.0 && self.train_split < 1.0) {
            return Err(invalid("train_split", format!("{} is outside (0, 1)", self.train_split)));
        }
        if self.epochs == 0 {
            return Err(invalid("epochs", "must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid("learning_rate", "must be a positive number"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> TrainError {
    TrainError::InvalidOption {
        field,
        reason: reason.into(),
    }
}

/// Split `total` records into (train, validation) counts.
///
/// The training count is rounded down.
pub fn split_counts(total: usize, train_split: f32) -> (usize, usize) {
    let train = ((total as f64 * train_split as f64).floor() as usize).min(total);
    (train, total - train)
}

/// Precomputed model input and target.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub features: Vec<f32>,
    pub target: ControlSample,
}

impl Sample {
    pub fn from_record(record: &TrainingRecord, grid: (u32, u32)) -> Self {
        Self {
            features: extract_features(&record.image, grid),
            target: ControlSample::new(record.angle, record.throttle),
        }
    }
}

/// Per-epoch losses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainHistory {
    pub train_loss: Vec<f32>,
    pub val_loss: Vec<f32>,
    /// Epoch (0-based) that produced the saved model.
    pub best_epoch: Option<usize>,
    pub stopped_early: bool,
}

impl TrainHistory {
    pub fn best_val_loss(&self) -> Option<f32> {
        self.best_epoch.map(|e| self.val_loss[e])
    }
}

/// Fits a model to samples and saves the best one.
pub trait Trainer {
    fn train(
        &mut self,
        model: &mut LinearPilot,
        train: &[Sample],
        validation: &[Sample],
        steps_per_epoch: usize,
    ) -> Result<TrainHistory, TrainError>;
}

/// Mini-batch gradient descent on squared error of both heads.
pub struct LinearTrainer {
    saved_model_path: PathBuf,
    batch_size: usize,
    epochs: usize,
    learning_rate: f32,
    patience: usize,
    rng: StdRng,
}

impl LinearTrainer {
    pub fn new(options: &TrainOptions, saved_model_path: PathBuf) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            saved_model_path,
            batch_size: options.batch_size,
            epochs: options.epochs,
            learning_rate: options.learning_rate,
            patience: options.early_stop_patience,
            rng,
        }
    }

    fn step(&self, model: &mut LinearPilot, batch: &[&Sample]) {
        let scale = self.learning_rate / batch.len() as f32;
        let mut grad_angle = LinearHead::zeros(model.feature_len());
        let mut grad_throttle = LinearHead::zeros(model.feature_len());

        for sample in batch {
            accumulate(&model.angle, &mut grad_angle, &sample.features, sample.target.angle);
            accumulate(&model.throttle, &mut grad_throttle, &sample.features, sample.target.throttle);
        }
        apply(&mut model.angle, &grad_angle, scale);
        apply(&mut model.throttle, &grad_throttle, scale);
    }
}

/// Add d(err²)/d(params) of one sample to `grad`.
fn accumulate(head: &LinearHead, grad: &mut LinearHead, features: &[f32], target: f32) {
    let out = head.output(features);
    let dz = 2.0 * (out - target) * (1.0 - out * out);
    for (g, x) in grad.weights.iter_mut().zip(features) {
        *g += dz * x;
    }
    grad.bias += dz;
}

fn apply(head: &mut LinearHead, grad: &LinearHead, scale: f32) {
    for (w, g) in head.weights.iter_mut().zip(&grad.weights) {
        *w -= scale * g;
    }
    head.bias -= scale * grad.bias;
}

/// Mean squared error over both outputs.
pub fn loss(model: &LinearPilot, samples: &[Sample]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let total: f32 = samples
        .iter()
        .map(|s| {
            let p = model.predict_features(&s.features);
            let da = p.angle - s.target.angle;
            let dt = p.throttle - s.target.throttle;
            (da * da + dt * dt) / 2.0
        })
        .sum();
    total / samples.len() as f32
}

impl Trainer for LinearTrainer {
    fn train(
        &mut self,
        model: &mut LinearPilot,
        train: &[Sample],
        validation: &[Sample],
        steps_per_epoch: usize,
    ) -> Result<TrainHistory, TrainError> {
        let mut history = TrainHistory::default();
        let mut best: Option<(f32, LinearPilot)> = None;
        let mut since_best = 0;
        let mut order: Vec<&Sample> = train.iter().collect();

        for epoch in 0..self.epochs {
            order.shuffle(&mut self.rng);
            for batch in order.chunks(self.batch_size).take(steps_per_epoch) {
                self.step(model, batch);
            }

            let train_loss = loss(model, train);
            // No validation records: track training loss instead
            let val_loss = if validation.is_empty() { train_loss } else { loss(model, validation) };
            history.train_loss.push(train_loss);
            history.val_loss.push(val_loss);
            debug!(epoch, train_loss, val_loss, "Epoch finished");

            let improved = best.as_ref().map_or(true, |(b, _)| val_loss < b - MIN_DELTA);
            if improved {
                info!(epoch, val_loss, path = %self.saved_model_path.display(), "Validation loss improved, saving model");
                model.save(&self.saved_model_path)?;
                best = Some((val_loss, model.clone()));
                history.best_epoch = Some(epoch);
                since_best = 0;
            } else {
                since_best += 1;
                if since_best >= self.patience {
                    info!(epoch, patience = self.patience, "Early stopping");
                    history.stopped_early = true;
                    break;
                }
            }
        }

        if let Some((_, best_model)) = best {
            *model = best_model;
        }
        Ok(history)
    }
}

/// Result of [`train`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub total_train: usize,
    pub total_val: usize,
    pub steps_per_epoch: usize,
    pub model_path: PathBuf,
    pub history: TrainHistory,
}

/// Train a pilot from `options.tubs` and save it to `options.new_model_path`.
pub fn train(options: &TrainOptions) -> Result<TrainSummary, TrainError> {
    options.validate()?;
    let new_model_path = expand_home(&options.new_model_path);

    let mut model = match &options.base_model_path {
        Some(base) => LinearPilot::load(expand_home(base))?,
        None => LinearPilot::default(),
    };

    info!(tubs = ?options.tubs, "Loading tubs");
    let group = TubGroup::open(&options.tubs)?;
    let mut records = group.training_records()?;

    let (total_train, total_val) = split_counts(records.len(), options.train_split);
    info!("train: {}, validation: {}", total_train, total_val);
    let steps_per_epoch = total_train / options.batch_size;
    info!(steps_per_epoch, "steps_per_epoch");
    if steps_per_epoch == 0 {
        return Err(TrainError::NotEnoughRecords {
            train: total_train,
            batch_size: options.batch_size,
        });
    }

    let mut trainer = LinearTrainer::new(options, new_model_path.clone());
    records.shuffle(&mut trainer.rng);
    let samples: Vec<Sample> = records
        .iter()
        .map(|r| Sample::from_record(r, model.grid))
        .collect();
    let (train_set, val_set) = samples.split_at(total_train);

    let history = trainer.train(&mut model, train_set, val_set, steps_per_epoch)?;
    info!(
        epochs = history.val_loss.len(),
        best_val_loss = ?history.best_val_loss(),
        path = %new_model_path.display(),
        "Training finished"
    );

    Ok(TrainSummary {
        total_train,
        total_val,
        steps_per_epoch,
        model_path: new_model_path,
        history,
    })
}
