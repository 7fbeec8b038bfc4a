//! Per-channel normalization constants handed to the training loader.

use crate::stats::ChannelStats;
use serde::{Deserialize, Serialize};

/// Single-channel mean of the v03 depth captures, replicated per channel by default.
pub const DEFAULT_DEPTH_MEAN: f64 = 96.8104350432;
/// Single-channel std of the v03 depth captures.
pub const DEFAULT_DEPTH_STD: f64 = 84.6227108358;
pub const DEFAULT_CHANNELS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Default for Normalization {
    fn default() -> Self {
        Self::from_stats(
            ChannelStats {
                mean: DEFAULT_DEPTH_MEAN,
                std: DEFAULT_DEPTH_STD,
            },
            DEFAULT_CHANNELS,
        )
    }
}

impl Normalization {
    /// Replicate one channel's statistics across `channels` channels.
    pub fn from_stats(stats: ChannelStats, channels: usize) -> Self {
        Self {
            mean: vec![stats.mean; channels],
            std: vec![stats.std; channels],
        }
    }

    pub fn channels(&self) -> usize {
        self.mean.len()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.mean.is_empty() {
            return Err("normalization needs at least one channel".into());
        }
        if self.mean.len() != self.std.len() {
            return Err(format!(
                "mean has {} channels but std has {}",
                self.mean.len(),
                self.std.len()
            ));
        }
        if let Some((c, s)) = self
            .std
            .iter()
            .enumerate()
            .find(|(_, s)| !s.is_finite() || **s <= 0.0)
        {
            return Err(format!("std for channel {c} must be positive, got {s}"));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err("mean must be finite".into());
        }
        Ok(())
    }

    fn channel(&self, channel: usize) -> Option<(f64, f64)> {
        Some((*self.mean.get(channel)?, *self.std.get(channel)?))
    }

    /// `None` when `channel` is out of range.
    pub fn normalize(&self, value: f64, channel: usize) -> Option<f64> {
        let (mean, std) = self.channel(channel)?;
        Some((value - mean) / std)
    }

    /// Undo `normalize` and clamp back to an 8-bit intensity.
    pub fn denormalize(&self, value: f64, channel: usize) -> Option<u8> {
        let (mean, std) = self.channel(channel)?;
        Some((value * std + mean).round().clamp(0.0, 255.0) as u8)
    }

    /// Normalized values of intensities 0 and 255 for each channel.
    pub fn input_range(&self) -> Vec<(f64, f64)> {
        (0..self.channels())
            .filter_map(|c| Some((self.normalize(0.0, c)?, self.normalize(255.0, c)?)))
            .collect()
    }
}
