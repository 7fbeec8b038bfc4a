//! Core types, error definitions, and data structures for bedmake_dataset.

use data_contracts::{SampleClass, ValidationError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::stats::ChannelStats;

pub type DatasetResult<T> = Result<T, BedmakeDatasetError>;

#[derive(Debug, Error)]
pub enum BedmakeDatasetError {
    #[error("target directory exists: {path} (delete it to materialize again)")]
    TargetExists { path: PathBuf },
    #[error("no .{extension} batch files found under {head}")]
    NoBatchFiles { head: PathBuf, extension: String },
    #[error("unsupported image extension '{extension}' (expected a lossless format such as png)")]
    UnsupportedImageExtension { extension: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("pickle decode error at {path}: {source}")]
    Pickle {
        path: PathBuf,
        #[source]
        source: serde_pickle::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("sample {index} of {path}: {source}")]
    InvalidSample {
        path: PathBuf,
        index: usize,
        #[source]
        source: ValidationError,
    },
    #[error("image error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("no class subdirectories under {0}")]
    NoClasses(PathBuf),
    #[error("{0}")]
    Other(String),
}

impl BedmakeDatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BedmakeDatasetError::Io {
            path: path.into(),
            source,
        }
    }

    /// The offending class code, if this error is an invalid label.
    pub fn invalid_label(&self) -> Option<i64> {
        match self {
            BedmakeDatasetError::InvalidSample {
                source: ValidationError::InvalidLabel(value),
                ..
            } => Some(*value),
            _ => None,
        }
    }
}

/// Dataset partition. Assigned by batch-file position, never sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Valid,
}

impl Split {
    pub const ALL: [Split; 2] = [Split::Train, Split::Valid];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
        }
    }

    /// Split for the batch at `index` among `total` sorted batch files.
    pub fn for_batch(index: usize, total: usize) -> Self {
        if index + 1 == total {
            Split::Valid
        } else {
            Split::Train
        }
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub success: usize,
    pub failure: usize,
}

impl LabelCounts {
    pub fn get(&self, class: SampleClass) -> usize {
        match class {
            SampleClass::Success => self.success,
            SampleClass::Failure => self.failure,
        }
    }

    pub fn bump(&mut self, class: SampleClass) {
        match class {
            SampleClass::Success => self.success += 1,
            SampleClass::Failure => self.failure += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.failure
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub path: PathBuf,
    pub split: Split,
    pub samples: usize,
}

/// Result of one materialization pass; also stored as `summary.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterializeSummary {
    pub batches: Vec<BatchSummary>,
    pub train: LabelCounts,
    pub valid: LabelCounts,
    pub totals: LabelCounts,
    /// Number of single-channel pixel values behind `pixel_stats`.
    pub pixel_count: u64,
    pub pixel_stats: Option<ChannelStats>,
}

impl MaterializeSummary {
    pub fn split(&self, split: Split) -> &LabelCounts {
        match split {
            Split::Train => &self.train,
            Split::Valid => &self.valid,
        }
    }

    pub fn total_samples(&self) -> usize {
        self.totals.total()
    }
}
