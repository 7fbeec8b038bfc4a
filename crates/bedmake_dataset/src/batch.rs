//! Batch file discovery and decoding.

use crate::types::{BedmakeDatasetError, DatasetResult};
use clap::ValueEnum;
use data_contracts::SampleRecord;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Serialization of a batch file. Each format recognizes exactly one extension.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchFormat {
    /// Python pickle holding a list of `{"class": int, "d_img": nested list}` dicts.
    #[default]
    #[value(alias = "pkl")]
    #[serde(alias = "pkl")]
    Pickle,
    /// JSON array of the same records.
    Json,
}

impl BatchFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            BatchFormat::Pickle => "pkl",
            BatchFormat::Json => "json",
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension().and_then(|s| s.to_str()) == Some(self.extension())
    }
}

/// Batch files directly under `head`, sorted by file name.
pub fn list_batch_files(head: &Path, format: BatchFormat) -> DatasetResult<Vec<PathBuf>> {
    let entries = fs::read_dir(head).map_err(|e| BedmakeDatasetError::io(head, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| BedmakeDatasetError::io(head, e))?;
        let path = entry.path();
        if path.is_file() && format.matches(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Decode one batch file into its samples, in stored order.
pub fn read_batch(path: &Path, format: BatchFormat) -> DatasetResult<Vec<SampleRecord>> {
    let file = File::open(path).map_err(|e| BedmakeDatasetError::io(path, e))?;
    let reader = BufReader::new(file);
    match format {
        BatchFormat::Pickle => {
            // Python 2 pickles store dict keys as byte strings.
            let opts = serde_pickle::DeOptions::new().decode_strings();
            serde_pickle::from_reader(reader, opts).map_err(|e| BedmakeDatasetError::Pickle {
                path: path.to_path_buf(),
                source: e,
            })
        }
        BatchFormat::Json => {
            serde_json::from_reader(reader).map_err(|e| BedmakeDatasetError::Json {
                path: path.to_path_buf(),
                source: e,
            })
        }
    }
}
