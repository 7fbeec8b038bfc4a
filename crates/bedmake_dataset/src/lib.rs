//! Dataset preparation for the bed-making success/failure classifier.
//!
//! This crate provides utilities for:
//! - Discovering and decoding serialized sample batches
//! - Materializing them into a `train/valid` image-folder tree
//! - Exact single-channel pixel statistics for loader normalization
//! - Indexing and re-checking a materialized tree

pub mod batch;
pub mod image_folder;
pub mod materialize;
pub mod normalization;
pub mod stats;
pub mod types;

pub use batch::{list_batch_files, read_batch, BatchFormat};
pub use image_folder::{ImageFolder, MaterializedDataset, StatsCheck};
pub use materialize::{
    image_format_for, materialize, read_summary, save_depth_image, write_summary, MaterializeConfig, Materializer,
    SUMMARY_FILE,
};
pub use normalization::{Normalization, DEFAULT_DEPTH_MEAN, DEFAULT_DEPTH_STD};
pub use stats::{ChannelStats, PixelHistogram};
pub use types::*;

pub use data_contracts::{DepthImage, SampleClass, SampleRecord, ValidationError};
