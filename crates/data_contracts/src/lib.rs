//! Shared data contracts for serialized bed-making depth samples.

pub mod sample;

pub use sample::{DepthImage, SampleClass, SampleRecord, ValidationError};
