//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`] which runs everything in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use compressionx_pipeline::{NoProgress, Pipeline, PipelineConfig, PipelineError, ResampleUpscaler};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let mut engine = ResampleUpscaler::new(4);
//! let result = Pipeline::new(png, PipelineConfig::default())
//!     .decode()?
//!     .compress()?
//!     .upscale(&mut engine, &mut NoProgress)
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next stage (or
//! `Result` for fallible stages), carrying every earlier intermediate.
//! The upscale step is infallible at this level: an engine failure
//! becomes [`UpscaleOutcome::Fallback`].

use image::DynamicImage;

use crate::reencode;
use crate::types::{
    Artifact, Dimensions, PipelineConfig, PipelineError, ProcessResult, RgbImage, UpscaleError,
    UpscaleOutcome,
};
use crate::upscale::{self, Progress, SuperResolution};

/// Entry point for the staged API.
pub struct Pipeline;

impl Pipeline {
    /// Start a pipeline over `source` bytes. Nothing is validated or
    /// decoded until [`Pending::decode`].
    pub const fn new(source: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending { config, source }
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Validate the config, decode the source and advance to [`Decoded`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for an out-of-range
    /// config, [`PipelineError::EmptyInput`] for empty bytes and
    /// [`PipelineError::ImageDecode`] for undecodable bytes.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        self.config.validate()?;
        let image = crate::decode::decode(&self.source)?;
        Ok(Decoded {
            config: self.config,
            dimensions: Dimensions::of(&image),
            source: self.source,
            image,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the source image.
#[must_use = "pipeline stages are consumed by advancing; call .compress() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    source: Vec<u8>,
    image: DynamicImage,
    dimensions: Dimensions,
}

impl Decoded {
    /// The decoded source image.
    #[must_use]
    pub const fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Source dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Run every re-encode pass and advance to [`Compressed`].
    ///
    /// The first pass encodes the already-decoded image; each later pass
    /// decodes the previous pass's bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ImageEncode`] if the encoder fails, or
    /// [`PipelineError::ImageDecode`] if a pass cannot decode its own
    /// predecessor's output.
    pub fn compress(self) -> Result<Compressed, PipelineError> {
        let PipelineConfig {
            quality,
            passes,
            format,
            ..
        } = self.config;
        let mut pass_sizes = Vec::with_capacity(usize::from(passes));

        let mut bytes = reencode::encode(&self.image, quality, format)?;
        pass_sizes.push(bytes.len());
        for _ in 1..passes {
            bytes = reencode::reencode(&bytes, quality, format)?;
            pass_sizes.push(bytes.len());
        }

        let decoded = crate::decode::decode(&bytes)?.to_rgb8();
        Ok(Compressed {
            original: Artifact {
                bytes: self.source,
                dimensions: self.dimensions,
            },
            compressed: Artifact {
                bytes,
                dimensions: Dimensions::of(&decoded),
            },
            decoded,
            pass_sizes,
            config: self.config,
        })
    }
}

// ───────────────────────── Stage 2: Compressed ───────────────────────

/// Pipeline state after the last re-encode pass.
#[must_use = "pipeline stages are consumed by advancing; call .upscale() or .skip_upscale() to continue"]
pub struct Compressed {
    config: PipelineConfig,
    original: Artifact,
    compressed: Artifact,
    decoded: RgbImage,
    pass_sizes: Vec<usize>,
}

impl Compressed {
    /// The untouched source.
    #[must_use]
    pub const fn original(&self) -> &Artifact {
        &self.original
    }

    /// The final re-encoded bytes.
    #[must_use]
    pub const fn compressed(&self) -> &Artifact {
        &self.compressed
    }

    /// The final re-encoded image, decoded.
    #[must_use]
    pub const fn decoded(&self) -> &RgbImage {
        &self.decoded
    }

    /// Encoded size after each pass, in order.
    #[must_use]
    pub fn pass_sizes(&self) -> &[usize] {
        &self.pass_sizes
    }

    /// The config this pipeline runs with.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run `model` over the compressed image and advance to [`Finished`].
    ///
    /// Engine failures are captured as [`UpscaleOutcome::Fallback`].
    pub fn upscale(self, model: &mut dyn SuperResolution, progress: &mut dyn Progress) -> Finished {
        let outcome = match upscale::upscale(&self.decoded, model, &self.config, progress) {
            Ok(report) => UpscaleOutcome::Upscaled {
                image: report.image,
                working: report.working,
                engine: report.engine,
            },
            Err(reason) => UpscaleOutcome::Fallback { reason },
        };
        self.finish(outcome)
    }

    /// Advance to [`Finished`] without upscaling, e.g. because no model
    /// could be loaded.
    pub fn skip_upscale(self, reason: UpscaleError) -> Finished {
        self.finish(UpscaleOutcome::Fallback { reason })
    }

    fn finish(self, upscaled: UpscaleOutcome) -> Finished {
        Finished {
            original: self.original,
            compressed: self.compressed,
            pass_sizes: self.pass_sizes,
            upscaled,
        }
    }
}

// ───────────────────────── Stage 3: Finished ─────────────────────────

/// Final pipeline state.
#[must_use = "call .into_result() to take the pipeline output"]
pub struct Finished {
    original: Artifact,
    compressed: Artifact,
    pass_sizes: Vec<usize>,
    upscaled: UpscaleOutcome,
}

impl Finished {
    /// The super-resolution outcome.
    #[must_use]
    pub const fn upscaled(&self) -> &UpscaleOutcome {
        &self.upscaled
    }

    /// Encoded size after each re-encode pass, in order.
    #[must_use]
    pub fn pass_sizes(&self) -> &[usize] {
        &self.pass_sizes
    }

    /// Consume the pipeline and return the [`ProcessResult`].
    #[must_use]
    pub fn into_result(self) -> ProcessResult {
        ProcessResult {
            original: self.original,
            compressed: self.compressed,
            upscaled: self.upscaled,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::reencode::EncodeFormat;
    use crate::upscale::tests::{Recorder, quiet_config};
    use crate::upscale::{NoProgress, ResampleUpscaler};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_with_encoder(image::codecs::png::PngEncoder::new(&mut buf))
            .unwrap();
        buf
    }

    #[test]
    fn decode_validates_config_first() {
        let config = PipelineConfig {
            quality: 0,
            ..quiet_config()
        };
        let result = Pipeline::new(Vec::new(), config).decode();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn decode_reports_empty_input() {
        let result = Pipeline::new(Vec::new(), quiet_config()).decode();
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn compress_records_each_pass() {
        let compressed = Pipeline::new(png(64, 32), quiet_config())
            .decode()
            .unwrap()
            .compress()
            .unwrap();
        assert_eq!(compressed.pass_sizes().len(), 2);
        assert_eq!(compressed.pass_sizes()[1], compressed.compressed().bytes.len());
        assert_eq!(compressed.compressed().dimensions, Dimensions::new(64, 32));
        assert_eq!(compressed.original().dimensions, Dimensions::new(64, 32));
    }

    #[test]
    fn compress_matches_standalone_reencoder() {
        let source = png(48, 48);
        let compressed = Pipeline::new(source.clone(), quiet_config())
            .decode()
            .unwrap()
            .compress()
            .unwrap();
        let expected = reencode::compress(&source, 40, 2, EncodeFormat::Jpeg).unwrap();
        assert_eq!(compressed.compressed().bytes, expected);
    }

    #[test]
    fn original_bytes_are_untouched() {
        let source = png(20, 10);
        let result = Pipeline::new(source.clone(), quiet_config())
            .decode()
            .unwrap()
            .compress()
            .unwrap()
            .skip_upscale(UpscaleError::ModelUnavailable("none".to_string()))
            .into_result();
        assert_eq!(result.original.bytes, source);
    }

    #[test]
    fn upscale_success_yields_upscaled_outcome() {
        let mut engine = ResampleUpscaler::new(2);
        let mut rec = Recorder::default();
        let finished = Pipeline::new(png(100, 50), quiet_config())
            .decode()
            .unwrap()
            .compress()
            .unwrap()
            .upscale(&mut engine, &mut rec);
        match finished.upscaled() {
            UpscaleOutcome::Upscaled { image, working, .. } => {
                assert_eq!(*working, Dimensions::new(540, 270));
                assert_eq!(image.dimensions(), (1080, 540));
            }
            UpscaleOutcome::Fallback { reason } => panic!("unexpected fallback: {reason}"),
        }
        assert_eq!(rec.ticks.last(), Some(&100));
    }

    #[test]
    fn skip_upscale_yields_fallback() {
        let finished = Pipeline::new(png(10, 10), quiet_config())
            .decode()
            .unwrap()
            .compress()
            .unwrap()
            .skip_upscale(UpscaleError::ModelUnavailable("models/EDSR_x4.onnx".to_string()));
        assert!(!finished.upscaled().is_upscaled());
        let result = finished.into_result();
        assert!(matches!(
            result.upscaled.reason(),
            Some(UpscaleError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn engine_error_becomes_fallback() {
        let mut engine = ResampleUpscaler::new(0);
        let result = Pipeline::new(png(10, 10), quiet_config())
            .decode()
            .unwrap()
            .compress()
            .unwrap()
            .upscale(&mut engine, &mut NoProgress)
            .into_result();
        assert!(matches!(
            result.upscaled,
            UpscaleOutcome::Fallback {
                reason: UpscaleError::Inference(_)
            }
        ));
    }
}
