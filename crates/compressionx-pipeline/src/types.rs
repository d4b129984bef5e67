//! Shared types for the compressionx pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::downsample::WorkingFilter;
use crate::reencode::EncodeFormat;

/// Re-export `RgbImage` so downstream crates can reference decoded
/// pixel data without depending on `image` directly.
pub use image::RgbImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new pair of dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of an image buffer.
    #[must_use]
    pub fn of<I: image::GenericImageView>(image: &I) -> Self {
        Self::new(image.width(), image.height())
    }

    /// Total pixel count.
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Dimensions multiplied by an integer scale factor, or `None` if
    /// either axis overflows.
    #[must_use]
    pub const fn checked_scaled(self, factor: u32) -> Option<Self> {
        match (self.width.checked_mul(factor), self.height.checked_mul(factor)) {
            (Some(width), Some(height)) => Some(Self { width, height }),
            _ => None,
        }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Configuration for the compress-then-upscale pipeline.
///
/// The defaults are the fixed product constants of the demo: two
/// re-encode passes at quality 40, then a super-resolution pass over an
/// image bounded to a 540 pixel working width.
///
/// Fields are public; [`validate`](Self::validate) is called by every
/// pipeline entry point before any work is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Lossy encoder quality (1 = smallest, 100 = best).
    pub quality: u8,

    /// How many times the image is pushed through the lossy encoder.
    /// Each pass decodes the previous pass's output.
    pub passes: u8,

    /// Codec used by the re-encode passes of the in-memory pipeline.
    /// File-to-file operations pick the codec from the output path instead.
    pub format: EncodeFormat,

    /// Upper bound on the working size fed to the super-resolution
    /// model. The longer axis is resized to exactly this many pixels.
    pub max_width: u32,

    /// Resampling filter used for the working resize.
    pub working_filter: WorkingFilter,

    /// Percent increment between progress ticks.
    pub progress_step: u8,

    /// Delay between progress ticks (serialized as fractional seconds).
    #[serde(with = "crate::diagnostics::duration_serde")]
    pub progress_delay: Duration,
}

impl PipelineConfig {
    /// Default lossy encoder quality.
    pub const DEFAULT_QUALITY: u8 = 40;

    /// Default number of re-encode passes.
    pub const DEFAULT_PASSES: u8 = 2;

    /// Default re-encode codec.
    pub const DEFAULT_FORMAT: EncodeFormat = EncodeFormat::Jpeg;

    /// Default working width bound.
    pub const DEFAULT_MAX_WIDTH: u32 = 540;

    /// Default working resize filter.
    pub const DEFAULT_WORKING_FILTER: WorkingFilter = WorkingFilter::Area;

    /// Default progress increment in percent.
    pub const DEFAULT_PROGRESS_STEP: u8 = 10;

    /// Default delay between progress ticks.
    pub const DEFAULT_PROGRESS_DELAY: Duration = Duration::from_millis(50);

    /// Highest accepted number of re-encode passes.
    pub const MAX_PASSES: u8 = 16;

    /// Highest accepted working width bound.
    pub const MAX_WORKING_WIDTH: u32 = 8192;

    /// Check field ranges.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first field
    /// that is out of range.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(1..=100).contains(&self.quality) {
            return Err(PipelineError::InvalidConfig(format!(
                "quality must be in 1..=100, got {}",
                self.quality
            )));
        }
        if !(1..=Self::MAX_PASSES).contains(&self.passes) {
            return Err(PipelineError::InvalidConfig(format!(
                "passes must be in 1..={}, got {}",
                Self::MAX_PASSES,
                self.passes
            )));
        }
        if !(1..=Self::MAX_WORKING_WIDTH).contains(&self.max_width) {
            return Err(PipelineError::InvalidConfig(format!(
                "max_width must be in 1..={}, got {}",
                Self::MAX_WORKING_WIDTH,
                self.max_width
            )));
        }
        if !(1..=100).contains(&self.progress_step) {
            return Err(PipelineError::InvalidConfig(format!(
                "progress_step must be in 1..=100, got {}",
                self.progress_step
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quality: Self::DEFAULT_QUALITY,
            passes: Self::DEFAULT_PASSES,
            format: Self::DEFAULT_FORMAT,
            max_width: Self::DEFAULT_MAX_WIDTH,
            working_filter: Self::DEFAULT_WORKING_FILTER,
            progress_step: Self::DEFAULT_PROGRESS_STEP,
            progress_delay: Self::DEFAULT_PROGRESS_DELAY,
        }
    }
}

/// An encoded image together with its pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    /// Decoded dimensions.
    pub dimensions: Dimensions,
}

/// What the super-resolution stage produced.
///
/// A failed upscale does not fail the pipeline; it yields
/// [`UpscaleOutcome::Fallback`] so the caller shows the compressed image
/// in place of the upscaled one and knows it is doing so.
#[derive(Debug, Clone)]
pub enum UpscaleOutcome {
    /// The model ran and produced an image.
    Upscaled {
        /// The upscaled image.
        image: RgbImage,
        /// Size of the working image the model was run on.
        working: Dimensions,
        /// Name of the engine that produced the image.
        engine: String,
    },
    /// Upscaling did not happen; the compressed image is the final result.
    Fallback {
        /// Why upscaling was skipped or failed.
        reason: UpscaleError,
    },
}

impl UpscaleOutcome {
    /// Returns `true` if the model produced an image.
    #[must_use]
    pub const fn is_upscaled(&self) -> bool {
        matches!(self, Self::Upscaled { .. })
    }

    /// The upscaled image, if any.
    #[must_use]
    pub const fn image(&self) -> Option<&RgbImage> {
        match self {
            Self::Upscaled { image, .. } => Some(image),
            Self::Fallback { .. } => None,
        }
    }

    /// The failure reason, if upscaling fell back.
    #[must_use]
    pub const fn reason(&self) -> Option<&UpscaleError> {
        match self {
            Self::Upscaled { .. } => None,
            Self::Fallback { reason } => Some(reason),
        }
    }
}

/// Result of running the full pipeline over one image.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// The input bytes, untouched.
    pub original: Artifact,
    /// The output of the final re-encode pass.
    pub compressed: Artifact,
    /// The super-resolution result or the reason there is none.
    pub upscaled: UpscaleOutcome,
}

/// Errors that can occur while upscaling.
///
/// All variants carry plain strings so the error can cross process and
/// serialization boundaries; engines convert their own error types at
/// the trait seam.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum UpscaleError {
    /// The model could not be found or loaded.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The input image could not be read or decoded.
    #[error("could not read input image: {0}")]
    InputUnreadable(String),

    /// The engine failed while running.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The engine returned an image of the wrong size.
    #[error("expected {expected} output from the model, got {actual}")]
    UnexpectedOutput {
        /// Working size multiplied by the model scale.
        expected: Dimensions,
        /// What the engine actually returned.
        actual: Dimensions,
    },

    /// The upscaled image could not be written.
    #[error("could not write upscaled image: {0}")]
    Output(String),
}

/// Errors that can occur during pipeline processing.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// Failed to encode an image.
    #[error("failed to encode image: {0}")]
    ImageEncode(#[source] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The requested output format has no encoder.
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

/// Serde-compatible proxy for `PipelineError`.
///
/// The codec variants store their `Display` string. A deserialized codec
/// error comes back as [`PipelineError::InvalidConfig`] carrying the
/// original message, since `image::ImageError` cannot be rebuilt.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    ImageEncode(String),
    EmptyInput,
    UnsupportedFormat(String),
    InvalidConfig(String),
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::ImageEncode(e) => PipelineErrorProxy::ImageEncode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::UnsupportedFormat(s) => PipelineErrorProxy::UnsupportedFormat(s.clone()),
            Self::InvalidConfig(s) => PipelineErrorProxy::InvalidConfig(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::InvalidConfig(format!("image decode error: {msg}"))
            }
            PipelineErrorProxy::ImageEncode(msg) => {
                Self::InvalidConfig(format!("image encode error: {msg}"))
            }
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::UnsupportedFormat(s) => Self::UnsupportedFormat(s),
            PipelineErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
        })
    }
}
