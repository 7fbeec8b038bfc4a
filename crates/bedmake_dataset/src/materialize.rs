//! Convert serialized sample batches into a `train/valid` × `success/failure`
//! image-folder tree plus single-channel pixel statistics.

use crate::batch::{list_batch_files, read_batch, BatchFormat};
use crate::stats::PixelHistogram;
use crate::types::{
    BatchSummary, BedmakeDatasetError, DatasetResult, MaterializeSummary, Split,
};
use data_contracts::{DepthImage, SampleClass, SampleRecord};
use image::{ExtendedColorType, ImageFormat};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the summary written at the root of a materialized target.
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Clone)]
pub struct MaterializeConfig {
    /// Directory holding the batch files.
    pub head: PathBuf,
    /// Output root; must not exist yet.
    pub target: PathBuf,
    pub format: BatchFormat,
    /// File name prefix shared by every written image.
    pub file_prefix: String,
    /// Zero-padding width of the per-label counter.
    pub counter_width: usize,
    /// Image extension; also selects the encoder, see [`image_format_for`].
    pub image_extension: String,
}

impl MaterializeConfig {
    pub fn new(head: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            head: head.into(),
            target: target.into(),
            format: BatchFormat::default(),
            file_prefix: "d".to_string(),
            counter_width: 5,
            image_extension: "png".to_string(),
        }
    }

    pub fn with_format(mut self, format: BatchFormat) -> Self {
        self.format = format;
        self
    }

    /// `<prefix>_<counter>.<ext>`, counter zero-padded to `counter_width`.
    pub fn image_file_name(&self, counter: usize) -> String {
        format!(
            "{}_{:0width$}.{}",
            self.file_prefix,
            counter,
            self.image_extension,
            width = self.counter_width
        )
    }

    pub fn label_dir(&self, split: Split, class: SampleClass) -> PathBuf {
        self.target.join(split.as_str()).join(class.as_str())
    }
}

/// Encoder for an output extension.
///
/// Only lossless formats the build can encode are accepted, so the written
/// pixels decode back to exactly the values the statistics were taken from.
pub fn image_format_for(extension: &str) -> DatasetResult<ImageFormat> {
    match ImageFormat::from_extension(extension) {
        Some(ImageFormat::Png) if ImageFormat::Png.writing_enabled() => Ok(ImageFormat::Png),
        _ => Err(BedmakeDatasetError::UnsupportedImageExtension {
            extension: extension.to_string(),
        }),
    }
}

/// One pass over every batch file under `head`.
///
/// Owns the output tree and the statistics accumulator for the duration of the
/// pass. Any error aborts the pass and leaves whatever was already written.
pub struct Materializer {
    config: MaterializeConfig,
    summary: MaterializeSummary,
    histogram: PixelHistogram,
}

impl Materializer {
    pub fn new(config: MaterializeConfig) -> Self {
        Self {
            config,
            summary: MaterializeSummary::default(),
            histogram: PixelHistogram::new(),
        }
    }

    pub fn run(mut self) -> DatasetResult<MaterializeSummary> {
        let target = self.config.target.clone();
        if target.exists() {
            return Err(BedmakeDatasetError::TargetExists { path: target });
        }
        let image_format = image_format_for(&self.config.image_extension)?;
        let batches = list_batch_files(&self.config.head, self.config.format)?;
        if batches.is_empty() {
            return Err(BedmakeDatasetError::NoBatchFiles {
                head: self.config.head.clone(),
                extension: self.config.format.extension().to_string(),
            });
        }
        if batches.len() == 1 {
            warn!(
                batch = %batches[0].display(),
                "only one batch file; every sample goes to the valid split"
            );
        }
        self.create_tree()?;

        let total = batches.len();
        for (idx, path) in batches.iter().enumerate() {
            self.process_batch(path, Split::for_batch(idx, total), image_format)?;
        }

        self.summary.pixel_count = self.histogram.len();
        self.summary.pixel_stats = self.histogram.stats();
        write_summary(&target.join(SUMMARY_FILE), &self.summary)?;
        info!(
            success = self.summary.totals.success,
            failure = self.summary.totals.failure,
            total = self.summary.total_samples(),
            "done loading data"
        );
        Ok(self.summary)
    }

    fn create_tree(&self) -> DatasetResult<()> {
        let target = &self.config.target;
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| BedmakeDatasetError::io(parent, e))?;
        }
        fs::create_dir(target).map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => BedmakeDatasetError::TargetExists {
                path: target.clone(),
            },
            _ => BedmakeDatasetError::io(target, e),
        })?;
        for split in Split::ALL {
            for class in SampleClass::ALL {
                let dir = self.config.label_dir(split, class);
                fs::create_dir_all(&dir).map_err(|e| BedmakeDatasetError::io(&dir, e))?;
            }
        }
        Ok(())
    }

    fn process_batch(
        &mut self,
        path: &Path,
        split: Split,
        image_format: ImageFormat,
    ) -> DatasetResult<()> {
        let records = read_batch(path, self.config.format)?;
        info!(
            batch = %path.display(),
            len = records.len(),
            split = %split,
            "loaded batch"
        );
        for (index, record) in records.iter().enumerate() {
            self.write_sample(path, index, record, split, image_format)?;
        }
        self.summary.batches.push(BatchSummary {
            path: path.to_path_buf(),
            split,
            samples: records.len(),
        });
        info!(
            success = self.summary.totals.success,
            failure = self.summary.totals.failure,
            "so far"
        );
        Ok(())
    }

    fn write_sample(
        &mut self,
        batch: &Path,
        index: usize,
        record: &SampleRecord,
        split: Split,
        image_format: ImageFormat,
    ) -> DatasetResult<()> {
        let class = record
            .validate()
            .map_err(|source| BedmakeDatasetError::InvalidSample {
                path: batch.to_path_buf(),
                index,
                source,
            })?;
        // Counters are per label and run across both splits.
        let counter = self.summary.totals.get(class);
        let out = self
            .config
            .label_dir(split, class)
            .join(self.config.image_file_name(counter));
        save_depth_image(&record.d_img, &out, image_format)?;
        debug!(path = %out.display(), "wrote sample");

        self.summary.totals.bump(class);
        match split {
            Split::Train => self.summary.train.bump(class),
            Split::Valid => self.summary.valid.bump(class),
        }
        self.histogram.extend(record.d_img.first_channel());
        Ok(())
    }
}

/// Run a full materialization pass with `config`.
pub fn materialize(config: MaterializeConfig) -> DatasetResult<MaterializeSummary> {
    Materializer::new(config).run()
}

/// Write a validated depth image; channel values are stored verbatim.
pub fn save_depth_image(
    img: &DepthImage,
    path: &Path,
    image_format: ImageFormat,
) -> DatasetResult<()> {
    let color = match img.channels() {
        1 => ExtendedColorType::L8,
        3 => ExtendedColorType::Rgb8,
        4 => ExtendedColorType::Rgba8,
        n => {
            return Err(BedmakeDatasetError::Other(format!(
                "cannot encode {n}-channel image at {}",
                path.display()
            )))
        }
    };
    image::save_buffer_with_format(
        path,
        &img.interleaved(),
        img.width() as u32,
        img.height() as u32,
        color,
        image_format,
    )
    .map_err(|e| BedmakeDatasetError::Image {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn write_summary(path: &Path, summary: &MaterializeSummary) -> DatasetResult<()> {
    let file = File::create(path).map_err(|e| BedmakeDatasetError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary).map_err(|e| BedmakeDatasetError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .map_err(|e| BedmakeDatasetError::io(path, e))
}

pub fn read_summary(path: &Path) -> DatasetResult<MaterializeSummary> {
    let raw = fs::read(path).map_err(|e| BedmakeDatasetError::io(path, e))?;
    serde_json::from_slice(&raw).map_err(|e| BedmakeDatasetError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}
