//! Single-channel pixel statistics.
//!
//! The accumulator keeps the exact multiset of 8-bit values as a histogram, so
//! the derived mean and standard deviation do not depend on the order in which
//! samples were seen.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f64,
    /// Population standard deviation (divides by N).
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelHistogram {
    counts: [u64; 256],
    len: u64,
}

impl Default for PixelHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelHistogram {
    pub fn new() -> Self {
        Self {
            counts: [0; 256],
            len: 0,
        }
    }

    pub fn push(&mut self, value: u8) {
        self.counts[value as usize] += 1;
        self.len += 1;
    }

    pub fn merge(&mut self, other: &PixelHistogram) {
        for (dst, src) in self.counts.iter_mut().zip(other.counts.iter()) {
            *dst += src;
        }
        self.len += other.len;
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn count_of(&self, value: u8) -> u64 {
        self.counts[value as usize]
    }

    /// Mean and population std of every value pushed so far; `None` when empty.
    pub fn stats(&self) -> Option<ChannelStats> {
        if self.is_empty() {
            return None;
        }
        let n = self.len as f64;
        let sum: u64 = self
            .counts
            .iter()
            .enumerate()
            .map(|(value, count)| value as u64 * count)
            .sum();
        let mean = sum as f64 / n;
        let sq_dev: f64 = self
            .counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(value, count)| {
                let d = value as f64 - mean;
                d * d * *count as f64
            })
            .sum();
        Some(ChannelStats {
            mean,
            std: (sq_dev / n).sqrt(),
        })
    }
}

impl Extend<u8> for PixelHistogram {
    fn extend<I: IntoIterator<Item = u8>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl FromIterator<u8> for PixelHistogram {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut hist = PixelHistogram::new();
        hist.extend(iter);
        hist
    }
}
