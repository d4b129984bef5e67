//! compressionx-pipeline: Pure compress-then-upscale image pipeline (sans-IO).
//!
//! Takes an image through:
//! decode -> lossy re-encode (repeated) -> working resize ->
//! super-resolution.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and returns structured data. The super-resolution engine
//! is injected through the [`SuperResolution`] trait; model loading and
//! all filesystem interaction live in `compressionx-model` and
//! `compressionx-io`.

pub mod decode;
pub mod diagnostics;
pub mod downsample;
pub mod pipeline;
pub mod reencode;
pub mod types;
pub mod upscale;

pub use diagnostics::{Clock, PipelineDiagnostics};
pub use downsample::WorkingFilter;
pub use pipeline::Pipeline;
pub use reencode::EncodeFormat;
pub use types::{
    Artifact, Dimensions, PipelineConfig, PipelineError, ProcessResult, RgbImage, UpscaleError,
    UpscaleOutcome,
};
pub use upscale::{NoProgress, Progress, ResampleUpscaler, SuperResolution};

/// Run the full compress-then-upscale pipeline.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration, and
/// produces the three views of the image: the untouched original, the
/// repeatedly re-encoded version, and the super-resolved version of the
/// re-encoded one.
///
/// # Pipeline steps
///
/// 1. Validate the config
/// 2. Decode the source image
/// 3. Lossy re-encode, `config.passes` times, each pass decoding the last
/// 4. Resize the compressed image so its longer axis is `config.max_width`
/// 5. Run `model` on the working image, reporting to `progress`
///
/// A failure in step 5 does not fail the call: the result carries
/// [`UpscaleOutcome::Fallback`] with the reason.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the config is out of range.
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
/// Returns [`PipelineError::ImageEncode`] if a re-encode pass fails.
pub fn process(
    image_bytes: &[u8],
    config: &PipelineConfig,
    model: &mut dyn SuperResolution,
    progress: &mut dyn Progress,
) -> Result<ProcessResult, PipelineError> {
    Ok(Pipeline::new(image_bytes.to_vec(), config.clone())
        .decode()?
        .compress()?
        .upscale(model, progress)
        .into_result())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::upscale::tests::{Recorder, quiet_config};

    /// PNG with a diagonal gradient so the lossy encoder has detail to
    /// throw away.
    fn gradient_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(width, height, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = ((x + y) * 255 / (width + height)) as u8;
            image::Rgba([v, 255 - v, v / 2, 255])
        });
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn process_empty_input() {
        let result = process(
            &[],
            &quiet_config(),
            &mut ResampleUpscaler::new(4),
            &mut NoProgress,
        );
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_corrupt_input() {
        let result = process(
            &[0xFF, 0x00],
            &quiet_config(),
            &mut ResampleUpscaler::new(4),
            &mut NoProgress,
        );
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn process_invalid_config() {
        let config = PipelineConfig {
            passes: 0,
            ..quiet_config()
        };
        let result = process(
            &gradient_png(8, 8),
            &config,
            &mut ResampleUpscaler::new(4),
            &mut NoProgress,
        );
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn process_rejects_oversized_working_width() {
        let config = PipelineConfig {
            max_width: u32::MAX,
            ..quiet_config()
        };
        let result = process(
            &gradient_png(20, 40),
            &config,
            &mut ResampleUpscaler::new(4),
            &mut NoProgress,
        );
        assert!(
            matches!(result, Err(PipelineError::InvalidConfig(ref s)) if s.contains("max_width"))
        );
    }

    #[test]
    fn process_produces_three_views() {
        let png = gradient_png(200, 100);
        let mut rec = Recorder::default();
        let result = process(
            &png,
            &quiet_config(),
            &mut ResampleUpscaler::new(4),
            &mut rec,
        )
        .unwrap();

        assert_eq!(result.original.bytes, png);
        assert_eq!(result.original.dimensions, Dimensions::new(200, 100));
        assert_eq!(result.compressed.dimensions, Dimensions::new(200, 100));
        assert!(result.compressed.bytes.starts_with(&[0xFF, 0xD8]));

        let image = result.upscaled.image().unwrap();
        assert_eq!(image.dimensions(), (2160, 1080));
        assert_eq!(rec.ticks.first(), Some(&0));
        assert_eq!(rec.ticks.last(), Some(&100));
    }

    #[test]
    fn process_engine_failure_is_not_an_error() {
        let result = process(
            &gradient_png(30, 30),
            &quiet_config(),
            &mut ResampleUpscaler::new(0),
            &mut NoProgress,
        )
        .unwrap();
        assert!(!result.upscaled.is_upscaled());
        assert!(!result.compressed.bytes.is_empty());
    }
}
