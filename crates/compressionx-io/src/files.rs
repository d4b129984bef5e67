//! File-to-file operations.
//!
//! Re-encoding reports failure as an error. Upscaling never does: any
//! failure is logged and degrades to the input path, so a caller always
//! has an image to show.

use std::fs;
use std::path::{Path, PathBuf};

use compressionx_model::{ModelSpec, OnnxSuperResolution};
use compressionx_pipeline::reencode::{self, EncodeFormat};
use compressionx_pipeline::{
    Dimensions, PipelineConfig, Progress, ResampleUpscaler, SuperResolution, UpscaleError,
    upscale,
};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::IoError;

/// JPEG quality the upscaled image is saved at. It is a display copy,
/// not part of the compression being demonstrated.
pub const UPSCALED_QUALITY: u8 = 95;

/// Re-encode the image at `input` into `output`, `passes` times.
///
/// The codec is chosen from `output`'s extension. `output` may be the
/// same path as `input`.
///
/// # Errors
///
/// Returns [`IoError::NotFound`] if `input` does not exist (nothing is
/// written), [`IoError::Pipeline`] for a bad quality, an unsupported
/// output extension or undecodable input, and [`IoError::Read`] /
/// [`IoError::Write`] for filesystem failures.
pub fn compress_file(
    input: &Path,
    output: &Path,
    quality: u8,
    passes: u8,
) -> Result<PathBuf, IoError> {
    if !input.is_file() {
        tracing::error!(path = %input.display(), "input image not found");
        return Err(IoError::NotFound(input.to_path_buf()));
    }
    PipelineConfig {
        quality,
        passes,
        ..PipelineConfig::default()
    }
    .validate()?;
    let format = EncodeFormat::from_path(output)?;

    let bytes = fs::read(input).map_err(|source| IoError::Read {
        path: input.to_path_buf(),
        source,
    })?;
    let encoded = reencode::compress(&bytes, quality, passes, format)?;
    fs::write(output, &encoded).map_err(|source| IoError::Write {
        path: output.to_path_buf(),
        source,
    })?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        %format,
        quality,
        passes,
        bytes_in = bytes.len(),
        bytes_out = encoded.len(),
        "compressed image"
    );
    Ok(output.to_path_buf())
}

/// Which super-resolution engine to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Engine {
    /// A neural network loaded from a model file on every call.
    Onnx(ModelSpec),
    /// Lanczos resampling by an integer factor; needs no model file.
    Classical {
        /// Upscale factor.
        scale: u32,
    },
}

impl Engine {
    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::ModelUnavailable`] if an ONNX model cannot
    /// be found or loaded, or if a classical scale is outside
    /// `1..=ResampleUpscaler::MAX_SCALE`.
    pub fn load(&self) -> Result<Box<dyn SuperResolution>, UpscaleError> {
        match self {
            Self::Onnx(spec) => Ok(Box::new(OnnxSuperResolution::load(spec)?)),
            Self::Classical { scale } if (1..=ResampleUpscaler::MAX_SCALE).contains(scale) => {
                Ok(Box::new(ResampleUpscaler::new(*scale)))
            }
            Self::Classical { scale } => Err(UpscaleError::ModelUnavailable(format!(
                "classical scale must be in 1..={}, got {scale}",
                ResampleUpscaler::MAX_SCALE
            ))),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::Onnx(ModelSpec::default())
    }
}

/// What [`upscale_file`] produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpscaleFileOutcome {
    /// The upscaled image was written.
    Upscaled {
        /// Where it was written.
        path: PathBuf,
        /// Its size.
        dimensions: Dimensions,
    },
    /// Nothing was written; the input stands in for the result.
    Fallback {
        /// The input path.
        path: PathBuf,
        /// What went wrong.
        reason: UpscaleError,
    },
}

impl UpscaleFileOutcome {
    /// The best available result: the upscaled file, or the input.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Upscaled { path, .. } | Self::Fallback { path, .. } => path,
        }
    }

    /// Returns `true` if an upscaled image was written.
    #[must_use]
    pub const fn is_upscaled(&self) -> bool {
        matches!(self, Self::Upscaled { .. })
    }
}

/// Run `engine` over the image at `input` and write the result to
/// `output`.
///
/// The engine is loaded before the input is read. Any failure is logged
/// and yields [`UpscaleFileOutcome::Fallback`] carrying `input`.
pub fn upscale_file(
    input: &Path,
    output: &Path,
    engine: &Engine,
    config: &PipelineConfig,
    progress: &mut dyn Progress,
) -> UpscaleFileOutcome {
    match try_upscale_file(input, output, engine, config, progress) {
        Ok(dimensions) => {
            tracing::info!(
                input = %input.display(),
                output = %output.display(),
                %dimensions,
                "upscaled image"
            );
            UpscaleFileOutcome::Upscaled {
                path: output.to_path_buf(),
                dimensions,
            }
        }
        Err(reason) => {
            tracing::error!(
                input = %input.display(),
                %reason,
                "upscaling failed, keeping the input image"
            );
            UpscaleFileOutcome::Fallback {
                path: input.to_path_buf(),
                reason,
            }
        }
    }
}

fn try_upscale_file(
    input: &Path,
    output: &Path,
    engine: &Engine,
    config: &PipelineConfig,
    progress: &mut dyn Progress,
) -> Result<Dimensions, UpscaleError> {
    config
        .validate()
        .map_err(|e| UpscaleError::Inference(e.to_string()))?;
    let mut model = engine.load()?;

    let unreadable = |e: &dyn std::fmt::Display| {
        UpscaleError::InputUnreadable(format!("{}: {e}", input.display()))
    };
    let bytes = fs::read(input).map_err(|e| unreadable(&e))?;
    let image = compressionx_pipeline::decode::decode(&bytes)
        .map_err(|e| unreadable(&e))?
        .to_rgb8();

    let report = upscale::upscale(&image, model.as_mut(), config, progress)?;

    let output_error =
        |e: &dyn std::fmt::Display| UpscaleError::Output(format!("{}: {e}", output.display()));
    let format = EncodeFormat::from_path(output).map_err(|e| output_error(&e))?;
    let dimensions = Dimensions::of(&report.image);
    let encoded = reencode::encode(
        &DynamicImage::ImageRgb8(report.image),
        UPSCALED_QUALITY,
        format,
    )
    .map_err(|e| output_error(&e))?;
    fs::write(output, encoded).map_err(|e| output_error(&e))?;
    Ok(dimensions)
}
