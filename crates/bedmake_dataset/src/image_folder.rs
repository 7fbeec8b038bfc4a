// ImageFolder: index of a labeled-image-folder split
//
// Layout consumed by the training side:
//
//   split_root/
//     failure/
//       d_00000.png
//     success/
//       d_00000.png
//       d_00001.png
//
// Class names are the sorted subdirectory names and a class index is the
// position in that order, so `failure` is 0 and `success` is 1 here, which is
// the reverse of the `class` codes in the source records.

use crate::materialize::{read_summary, SUMMARY_FILE};
use crate::stats::{ChannelStats, PixelHistogram};
use crate::types::{BedmakeDatasetError, DatasetResult, MaterializeSummary, Split};
use image::{DynamicImage, ImageFormat};
use std::fs;
use std::path::{Path, PathBuf};

/// Files whose extension (case-insensitive) names a format this build decodes.
fn is_image(path: &Path) -> bool {
    ImageFormat::from_path(path)
        .map(|fmt| fmt.reading_enabled())
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct ImageFolder {
    class_names: Vec<String>,
    /// (path, class_index), sorted by class then path.
    entries: Vec<(PathBuf, usize)>,
}

impl ImageFolder {
    pub fn scan(root: impl Into<PathBuf>) -> DatasetResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(BedmakeDatasetError::NotADirectory(root));
        }

        let mut class_dirs: Vec<(String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&root).map_err(|e| BedmakeDatasetError::io(&root, e))? {
            let entry = entry.map_err(|e| BedmakeDatasetError::io(&root, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                class_dirs.push((name.to_string(), path));
            }
        }
        class_dirs.sort_by(|a, b| a.0.cmp(&b.0));
        if class_dirs.is_empty() {
            return Err(BedmakeDatasetError::NoClasses(root));
        }

        let mut entries = Vec::new();
        for (class_idx, (_, dir)) in class_dirs.iter().enumerate() {
            let mut files = Vec::new();
            for entry in fs::read_dir(dir).map_err(|e| BedmakeDatasetError::io(dir, e))? {
                let path = entry.map_err(|e| BedmakeDatasetError::io(dir, e))?.path();
                if path.is_file() && is_image(&path) {
                    files.push(path);
                }
            }
            files.sort();
            entries.extend(files.into_iter().map(|p| (p, class_idx)));
        }

        Ok(Self {
            class_names: class_dirs.into_iter().map(|(name, _)| name).collect(),
            entries,
        })
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn class_index(&self, name: &str) -> Option<usize> {
        self.class_names.iter().position(|c| c == name)
    }

    pub fn entries(&self) -> &[(PathBuf, usize)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_for(&self, name: &str) -> usize {
        match self.class_index(name) {
            Some(idx) => self.entries.iter().filter(|(_, c)| *c == idx).count(),
            None => 0,
        }
    }

    /// Decode every image and collect its first channel.
    pub fn pixel_histogram(&self) -> DatasetResult<PixelHistogram> {
        let mut hist = PixelHistogram::new();
        for (path, _) in &self.entries {
            let img = image::open(path).map_err(|e| BedmakeDatasetError::Image {
                path: path.clone(),
                source: e,
            })?;
            match img {
                DynamicImage::ImageLuma8(buf) => hist.extend(buf.into_raw()),
                other => hist.extend(other.to_rgb8().pixels().map(|px| px.0[0])),
            }
        }
        Ok(hist)
    }
}

/// Stored statistics next to the ones recomputed from the written images.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsCheck {
    pub stored: Option<ChannelStats>,
    pub recomputed: Option<ChannelStats>,
    pub stored_pixels: u64,
    pub recomputed_pixels: u64,
}

impl StatsCheck {
    pub fn matches(&self, tolerance: f64) -> bool {
        if self.stored_pixels != self.recomputed_pixels {
            return false;
        }
        match (self.stored, self.recomputed) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                (a.mean - b.mean).abs() <= tolerance && (a.std - b.std).abs() <= tolerance
            }
            _ => false,
        }
    }
}

/// A materialized target: both splits plus the summary written next to them.
#[derive(Debug, Clone)]
pub struct MaterializedDataset {
    pub train: ImageFolder,
    pub valid: ImageFolder,
    pub summary: Option<MaterializeSummary>,
}

impl MaterializedDataset {
    pub fn open(target: &Path) -> DatasetResult<Self> {
        let summary_path = target.join(SUMMARY_FILE);
        let summary = if summary_path.exists() {
            Some(read_summary(&summary_path)?)
        } else {
            None
        };
        Ok(Self {
            train: ImageFolder::scan(target.join(Split::Train.as_str()))?,
            valid: ImageFolder::scan(target.join(Split::Valid.as_str()))?,
            summary,
        })
    }

    pub fn split(&self, split: Split) -> &ImageFolder {
        match split {
            Split::Train => &self.train,
            Split::Valid => &self.valid,
        }
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.valid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn recompute_histogram(&self) -> DatasetResult<PixelHistogram> {
        let mut hist = self.train.pixel_histogram()?;
        hist.merge(&self.valid.pixel_histogram()?);
        Ok(hist)
    }

    pub fn check_stats(&self) -> DatasetResult<StatsCheck> {
        let hist = self.recompute_histogram()?;
        Ok(StatsCheck {
            stored: self.summary.as_ref().and_then(|s| s.pixel_stats),
            recomputed: hist.stats(),
            stored_pixels: self.summary.as_ref().map_or(0, |s| s.pixel_count),
            recomputed_pixels: hist.len(),
        })
    }
}
