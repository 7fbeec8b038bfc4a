use bedmake_dataset::Split;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::info;

use crate::TrainingConfig;

/// Summed loss and correct predictions over one minibatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Loss summed (not averaged) over the batch.
    pub loss_sum: f64,
    pub correct: usize,
    pub count: usize,
}

impl BatchOutcome {
    fn accumulate(&mut self, other: BatchOutcome) {
        self.loss_sum += other.loss_sum;
        self.correct += other.correct;
        self.count += other.count;
    }
}

/// The model side of a fine-tuning run, implemented on top of an ML framework.
pub trait Classifier {
    type Batch;
    type Weights: Clone;

    /// Forward, backward and one optimizer step at learning rate `lr`.
    fn train_batch(&mut self, batch: &Self::Batch, lr: f64) -> anyhow::Result<BatchOutcome>;
    /// Forward pass only.
    fn eval_batch(&mut self, batch: &Self::Batch) -> anyhow::Result<BatchOutcome>;
    fn snapshot(&self) -> Self::Weights;
    fn restore(&mut self, weights: Self::Weights);
}

/// Builds a classifier (loading pretrained weights) only when a run starts.
pub trait ClassifierFactory {
    type Model: Classifier;

    fn build(&self, config: &TrainingConfig) -> anyhow::Result<Self::Model>;
}

/// Source of minibatches for one pass over a split.
pub trait EpochData<B> {
    fn batches(&mut self, split: Split, epoch: usize) -> anyhow::Result<Vec<B>>;
}

impl<B, F> EpochData<B> for F
where
    F: FnMut(Split, usize) -> anyhow::Result<Vec<B>>,
{
    fn batches(&mut self, split: Split, epoch: usize) -> anyhow::Result<Vec<B>> {
        self(split, epoch)
    }
}

/// Learning rate decayed by `gamma` every `step_size` epochs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLr {
    pub base: f64,
    pub step_size: usize,
    pub gamma: f64,
}

impl StepLr {
    pub fn from_config(cfg: &TrainingConfig) -> Self {
        Self {
            base: cfg.learning_rate,
            step_size: cfg.lr_step_size.max(1),
            gamma: cfg.lr_gamma,
        }
    }

    pub fn rate(&self, epoch: usize) -> f64 {
        let decays = (epoch / self.step_size.max(1)) as i32;
        self.base * self.gamma.powi(decays)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub split: Split,
    pub loss: f64,
    pub accuracy: f64,
    pub correct: usize,
    pub count: usize,
}

impl PhaseReport {
    fn from_outcome(split: Split, total: BatchOutcome) -> Self {
        let denom = total.count.max(1) as f64;
        Self {
            split,
            loss: total.loss_sum / denom,
            accuracy: total.correct as f64 / denom,
            correct: total.correct,
            count: total.count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    pub epoch: usize,
    pub learning_rate: f64,
    pub train: PhaseReport,
    pub valid: PhaseReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs: Vec<EpochReport>,
    pub best_epoch: Option<usize>,
    pub best_valid_accuracy: f64,
    pub elapsed: Duration,
}

fn run_phase<C: Classifier>(
    model: &mut C,
    batches: &[C::Batch],
    split: Split,
    lr: f64,
) -> anyhow::Result<PhaseReport> {
    let mut total = BatchOutcome::default();
    for batch in batches {
        let outcome = match split {
            Split::Train => model.train_batch(batch, lr)?,
            Split::Valid => model.eval_batch(batch)?,
        };
        total.accumulate(outcome);
    }
    let report = PhaseReport::from_outcome(split, total);
    info!(
        phase = %split,
        loss = report.loss,
        acc = report.accuracy,
        num = report.correct,
        "phase complete"
    );
    Ok(report)
}

/// Run every configured epoch (train then valid), keep the weights with the
/// best validation accuracy and restore them before returning.
pub fn run_epochs<C, D>(
    model: &mut C,
    config: &TrainingConfig,
    data: &mut D,
) -> anyhow::Result<TrainingReport>
where
    C: Classifier,
    D: EpochData<C::Batch>,
{
    config.validate()?;
    let schedule = StepLr::from_config(config);
    let since = Instant::now();
    let mut best_weights = model.snapshot();
    let mut best_acc = 0.0;
    let mut best_epoch = None;
    let mut epochs = Vec::with_capacity(config.epochs);

    for epoch in 0..config.epochs {
        let lr = schedule.rate(epoch);
        info!(epoch, of = config.epochs - 1, lr, "epoch start");

        let train_batches = data.batches(Split::Train, epoch)?;
        let train = run_phase(model, &train_batches, Split::Train, lr)?;
        let valid_batches = data.batches(Split::Valid, epoch)?;
        let valid = run_phase(model, &valid_batches, Split::Valid, lr)?;

        if valid.accuracy > best_acc {
            best_acc = valid.accuracy;
            best_epoch = Some(epoch);
            best_weights = model.snapshot();
        }
        epochs.push(EpochReport {
            epoch,
            learning_rate: lr,
            train,
            valid,
        });
    }

    let elapsed = since.elapsed();
    info!(
        minutes = elapsed.as_secs() / 60,
        seconds = elapsed.as_secs() % 60,
        best_valid_accuracy = best_acc,
        "training finished"
    );
    model.restore(best_weights);
    Ok(TrainingReport {
        epochs,
        best_epoch,
        best_valid_accuracy: best_acc,
        elapsed,
    })
}

/// Build a classifier from `factory` and run the full training loop on it.
pub fn train<F, D>(
    factory: &F,
    config: &TrainingConfig,
    data: &mut D,
) -> anyhow::Result<(F::Model, TrainingReport)>
where
    F: ClassifierFactory,
    D: EpochData<<F::Model as Classifier>::Batch>,
{
    config.validate()?;
    info!(
        backbone = config.backbone.as_str(),
        data_root = %config.data_root.display(),
        "building classifier"
    );
    let mut model = factory.build(config)?;
    let report = run_epochs(&mut model, config, data)?;
    Ok((model, report))
}
