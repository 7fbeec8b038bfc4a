use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome label of a bed-making attempt, as stored in the `class` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleClass {
    Success,
    Failure,
}

impl SampleClass {
    pub const ALL: [SampleClass; 2] = [SampleClass::Success, SampleClass::Failure];

    /// Directory name used for this label in an image-folder layout.
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleClass::Success => "success",
            SampleClass::Failure => "failure",
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            SampleClass::Success => 0,
            SampleClass::Failure => 1,
        }
    }
}

impl TryFrom<i64> for SampleClass {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SampleClass::Success),
            1 => Ok(SampleClass::Failure),
            other => Err(ValidationError::InvalidLabel(other)),
        }
    }
}

impl std::fmt::Display for SampleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel array of one depth sample.
///
/// Either a `rows x cols` plane or a `rows x cols x channels` stack. Depth
/// captures usually replicate the single depth channel three times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    untagged,
    expecting = "d_img must be a nested list of 0..=255 ints (rows x cols, or rows x cols x channels)"
)]
pub enum DepthImage {
    Plane(Vec<Vec<u8>>),
    Stacked(Vec<Vec<Vec<u8>>>),
}

impl DepthImage {
    pub fn height(&self) -> usize {
        match self {
            DepthImage::Plane(rows) => rows.len(),
            DepthImage::Stacked(rows) => rows.len(),
        }
    }

    pub fn width(&self) -> usize {
        match self {
            DepthImage::Plane(rows) => rows.first().map_or(0, Vec::len),
            DepthImage::Stacked(rows) => rows.first().map_or(0, Vec::len),
        }
    }

    /// Channel count; a plane counts as one channel.
    pub fn channels(&self) -> usize {
        match self {
            DepthImage::Plane(_) => 1,
            DepthImage::Stacked(rows) => rows
                .first()
                .and_then(|row| row.first())
                .map_or(0, Vec::len),
        }
    }

    /// Check the array is non-empty, rectangular and uses a writable channel count.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let (height, width, channels) = (self.height(), self.width(), self.channels());
        if height == 0 || width == 0 {
            return Err(ValidationError::EmptyImage);
        }
        match self {
            DepthImage::Plane(rows) => {
                if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
                    return Err(ValidationError::RaggedImage {
                        row,
                        expected: width,
                        found: r.len(),
                    });
                }
            }
            DepthImage::Stacked(rows) => {
                if !matches!(channels, 1 | 3 | 4) {
                    return Err(ValidationError::UnsupportedChannels(channels));
                }
                for (row, r) in rows.iter().enumerate() {
                    if r.len() != width {
                        return Err(ValidationError::RaggedImage {
                            row,
                            expected: width,
                            found: r.len(),
                        });
                    }
                    if let Some(px) = r.iter().find(|px| px.len() != channels) {
                        return Err(ValidationError::ChannelMismatch {
                            row,
                            expected: channels,
                            found: px.len(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Row-major, channel-interleaved pixel bytes.
    pub fn interleaved(&self) -> Vec<u8> {
        match self {
            DepthImage::Plane(rows) => rows.iter().flatten().copied().collect(),
            DepthImage::Stacked(rows) => rows.iter().flatten().flatten().copied().collect(),
        }
    }

    /// Values of the first channel only, row-major.
    pub fn first_channel(&self) -> Vec<u8> {
        match self {
            DepthImage::Plane(rows) => rows.iter().flatten().copied().collect(),
            DepthImage::Stacked(rows) => rows
                .iter()
                .flatten()
                .filter_map(|px| px.first().copied())
                .collect(),
        }
    }
}

/// One serialized sample: a raw class code and its depth image.
///
/// Extra keys present in the source record are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub class: i64,
    #[serde(rename = "d_img", alias = "image")]
    pub d_img: DepthImage,
}

impl SampleRecord {
    pub fn new(class: SampleClass, d_img: DepthImage) -> Self {
        Self {
            class: class.code(),
            d_img,
        }
    }

    /// Validate the label first, then the image, and return the typed label.
    pub fn validate(&self) -> Result<SampleClass, ValidationError> {
        let class = SampleClass::try_from(self.class)?;
        self.d_img.validate()?;
        Ok(class)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid class label {0} (expected 0=success or 1=failure)")]
    InvalidLabel(i64),
    #[error("image has no pixels")]
    EmptyImage,
    #[error("image row {row} has {found} columns, expected {expected}")]
    RaggedImage {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("image row {row} has a pixel with {found} channels, expected {expected}")]
    ChannelMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("unsupported channel count {0} (expected 1, 3 or 4)")]
    UnsupportedChannels(usize),
}
