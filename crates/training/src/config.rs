use bedmake_dataset::{MaterializeSummary, Normalization};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pretrained backbone to fine-tune. Weights are only fetched when a
/// classifier is built for an actual training run.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backbone {
    #[default]
    Resnet18,
    Resnet34,
    Resnet50,
}

impl Backbone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backbone::Resnet18 => "resnet18",
            Backbone::Resnet34 => "resnet34",
            Backbone::Resnet50 => "resnet50",
        }
    }
}

/// Per-split image preprocessing the loader applies before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderPlan {
    /// Side of the random-resized crop used for training images.
    pub train_crop: u32,
    /// Shorter-side resize applied to validation images before the centre crop.
    pub valid_resize: u32,
    pub valid_crop: u32,
    pub shuffle: bool,
}

impl Default for LoaderPlan {
    fn default() -> Self {
        Self {
            train_crop: 224,
            valid_resize: 256,
            valid_crop: 224,
            shuffle: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Materialized dataset root containing `train/` and `valid/`.
    pub data_root: PathBuf,
    pub backbone: Backbone,
    pub pretrained: bool,
    pub num_classes: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub num_workers: usize,
    pub learning_rate: f64,
    pub momentum: f64,
    /// Epochs between learning-rate decays.
    pub lr_step_size: usize,
    pub lr_gamma: f64,
    pub normalization: Normalization,
    pub loader: LoaderPlan,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("datasets/bedmake_pytorch"),
            backbone: Backbone::default(),
            pretrained: true,
            num_classes: 2,
            epochs: 20,
            batch_size: 32,
            num_workers: 4,
            learning_rate: 0.01,
            momentum: 0.9,
            lr_step_size: 7,
            lr_gamma: 0.1,
            normalization: Normalization::default(),
            loader: LoaderPlan::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.epochs == 0 {
            anyhow::bail!("epochs must be at least 1");
        }
        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be at least 1");
        }
        if self.num_classes < 2 {
            anyhow::bail!("num_classes must be at least 2, got {}", self.num_classes);
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            anyhow::bail!("learning_rate must be positive, got {}", self.learning_rate);
        }
        if self.lr_step_size == 0 {
            anyhow::bail!("lr_step_size must be at least 1");
        }
        self.normalization
            .validate()
            .map_err(|e| anyhow::anyhow!("normalization: {e}"))?;
        Ok(())
    }

    /// Replace the normalization with the statistics of a materialized dataset.
    pub fn with_summary(mut self, summary: &MaterializeSummary) -> Self {
        if let Some(stats) = summary.pixel_stats {
            let channels = self.normalization.channels().max(1);
            self.normalization = Normalization::from_stats(stats, channels);
        }
        self
    }
}

/// Training flags shared by binaries that prepare or launch a run.
///
/// Every flag is optional; unset flags keep the value of the base config.
#[derive(Args, Debug, Clone, Default)]
pub struct TrainArgs {
    /// Materialized dataset root (contains train/ and valid/).
    #[arg(long)]
    pub data_root: Option<PathBuf>,
    /// Backbone to fine-tune [default: resnet18].
    #[arg(long, value_enum)]
    pub backbone: Option<Backbone>,
    /// Number of epochs [default: 20].
    #[arg(long)]
    pub epochs: Option<usize>,
    /// Batch size [default: 32].
    #[arg(long)]
    pub batch_size: Option<usize>,
    /// Learning rate [default: 0.01].
    #[arg(long)]
    pub lr: Option<f64>,
    /// SGD momentum [default: 0.9].
    #[arg(long)]
    pub momentum: Option<f64>,
    /// Decay the learning rate every N epochs [default: 7].
    #[arg(long)]
    pub lr_step_size: Option<usize>,
    /// Multiplicative decay applied every `lr_step_size` epochs [default: 0.1].
    #[arg(long)]
    pub lr_gamma: Option<f64>,
}

impl TrainArgs {
    /// Apply the flags that were given on top of `base`.
    pub fn apply(&self, base: TrainingConfig) -> TrainingConfig {
        TrainingConfig {
            data_root: self.data_root.clone().unwrap_or(base.data_root),
            backbone: self.backbone.unwrap_or(base.backbone),
            epochs: self.epochs.unwrap_or(base.epochs),
            batch_size: self.batch_size.unwrap_or(base.batch_size),
            learning_rate: self.lr.unwrap_or(base.learning_rate),
            momentum: self.momentum.unwrap_or(base.momentum),
            lr_step_size: self.lr_step_size.unwrap_or(base.lr_step_size),
            lr_gamma: self.lr_gamma.unwrap_or(base.lr_gamma),
            ..base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bedmake_dataset::{ChannelStats, LabelCounts};
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        train: TrainArgs,
    }

    #[test]
    fn defaults_validate() {
        assert!(TrainingConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_epochs_rejected() {
        let cfg = TrainingConfig {
            epochs: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn summary_stats_replace_normalization() {
        let summary = MaterializeSummary {
            totals: LabelCounts {
                success: 1,
                failure: 1,
            },
            pixel_count: 4,
            pixel_stats: Some(ChannelStats {
                mean: 10.0,
                std: 2.0,
            }),
            ..Default::default()
        };
        let cfg = TrainingConfig::default().with_summary(&summary);
        assert_eq!(cfg.normalization.mean, vec![10.0; 3]);
        assert_eq!(cfg.normalization.std, vec![2.0; 3]);
    }

    #[test]
    fn args_override_base() {
        let cli = TestCli::parse_from(["train", "--epochs", "3", "--backbone", "resnet50"]);
        let base = TrainingConfig {
            batch_size: 8,
            ..Default::default()
        };
        let cfg = cli.train.apply(base);
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.backbone, Backbone::Resnet50);
        assert_eq!(cfg.batch_size, 8);
        assert_eq!(cfg.lr_step_size, 7);
    }
}
