//! Super-resolution stage.
//!
//! The model itself is opaque: anything implementing [`SuperResolution`]
//! can be plugged in. This module owns what happens around it: bounding
//! the input to the working size, reporting progress, and checking that
//! the engine returned an image of the promised scale.

use std::time::Duration;

use image::RgbImage;
use image::imageops::FilterType;

use crate::downsample;
use crate::types::{Dimensions, PipelineConfig, UpscaleError};

/// A single-image super-resolution engine with a fixed integer scale.
pub trait SuperResolution {
    /// Short display name (e.g. `"EDSR"`).
    fn name(&self) -> &str;

    /// Output size divided by input size, per axis.
    fn scale(&self) -> u32;

    /// Produce an image exactly [`scale`](Self::scale) times the size of
    /// `input`.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::Inference`] (or another variant that fits
    /// better) when the engine cannot produce an image.
    fn upsample(&mut self, input: &RgbImage) -> Result<RgbImage, UpscaleError>;
}

/// Classical interpolation engine: resamples by the scale factor.
///
/// Needs no model file. Useful as a baseline against a neural engine and
/// as a deterministic engine in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleUpscaler {
    scale: u32,
    filter: FilterType,
}

impl ResampleUpscaler {
    /// Largest accepted scale factor.
    pub const MAX_SCALE: u32 = 8;

    /// Create an engine that enlarges by `scale` with Lanczos3.
    #[must_use]
    pub const fn new(scale: u32) -> Self {
        Self {
            scale,
            filter: FilterType::Lanczos3,
        }
    }

    /// Use a different resampling filter.
    #[must_use]
    pub const fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }
}

impl SuperResolution for ResampleUpscaler {
    fn name(&self) -> &'static str {
        "resample"
    }

    fn scale(&self) -> u32 {
        self.scale
    }

    fn upsample(&mut self, input: &RgbImage) -> Result<RgbImage, UpscaleError> {
        if !(1..=Self::MAX_SCALE).contains(&self.scale) {
            return Err(UpscaleError::Inference(format!(
                "scale must be in 1..={}, got {}",
                Self::MAX_SCALE,
                self.scale
            )));
        }
        let target = output_size(Dimensions::of(input), self.scale)?;
        Ok(image::imageops::resize(
            input,
            target.width,
            target.height,
            self.filter,
        ))
    }
}

/// Largest image, in pixels, the upscale stage will produce.
pub const MAX_OUTPUT_PIXELS: u64 = 1 << 28;

/// `input` multiplied by `scale`, bounded by [`MAX_OUTPUT_PIXELS`].
///
/// # Errors
///
/// Returns [`UpscaleError::Inference`] if the result overflows or is
/// larger than [`MAX_OUTPUT_PIXELS`].
pub fn output_size(input: Dimensions, scale: u32) -> Result<Dimensions, UpscaleError> {
    input
        .checked_scaled(scale)
        .filter(|d| d.pixel_count() <= MAX_OUTPUT_PIXELS)
        .ok_or_else(|| {
            UpscaleError::Inference(format!(
                "{input} at x{scale} exceeds {MAX_OUTPUT_PIXELS} output pixels"
            ))
        })
}

/// Receives progress updates from the upscale stage.
pub trait Progress {
    /// Called with a percentage in `0..=100` and a short status line.
    fn update(&mut self, percent: u8, message: &str);

    /// Called once when the stage completes successfully.
    fn finish(&mut self, _message: &str) {}
}

/// A [`Progress`] sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn update(&mut self, _percent: u8, _message: &str) {}
}

/// Emit progress ticks at `0, step, 2*step, ...` ending at exactly 100,
/// sleeping `delay` after each tick.
///
/// The ticks are cosmetic: the engine runs as a single blocking call and
/// reports nothing while it does.
pub fn run_progress(progress: &mut dyn Progress, step: u8, delay: Duration, label: &str) {
    let step = usize::from(step.max(1));
    let message = format!("Upscaling with {label}...");
    let mut last = None;
    for percent in (0..=100_u8).step_by(step) {
        progress.update(percent, &message);
        last = Some(percent);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
    if last != Some(100) {
        progress.update(100, &message);
    }
}

/// What the upscale stage produced.
#[derive(Debug, Clone)]
pub struct UpscaleReport {
    /// The upscaled image.
    pub image: RgbImage,
    /// Size of the image the engine was run on.
    pub working: Dimensions,
    /// Name of the engine.
    pub engine: String,
}

/// Run the super-resolution stage over `image`.
///
/// # Steps
///
/// 1. Compute the working size from `config.max_width` and bound the
///    output size
/// 2. Resize with `config.working_filter`
/// 3. Progress ticks
/// 4. Run the engine
/// 5. Check the output is `scale` times the working size
///
/// # Errors
///
/// Returns [`UpscaleError::Inference`] if the output would exceed
/// [`MAX_OUTPUT_PIXELS`], whatever the engine returns, or
/// [`UpscaleError::UnexpectedOutput`] if the engine returned an image of
/// the wrong size.
pub fn upscale(
    image: &RgbImage,
    model: &mut dyn SuperResolution,
    config: &PipelineConfig,
    progress: &mut dyn Progress,
) -> Result<UpscaleReport, UpscaleError> {
    let working = downsample::working_size(image.width(), image.height(), config.max_width);
    let expected = output_size(working, model.scale())?;
    let resized = downsample::resize_to(image, working, config.working_filter);

    let label = model.name().to_uppercase();
    run_progress(progress, config.progress_step, config.progress_delay, &label);

    let output = model.upsample(&resized)?;

    let actual = Dimensions::of(&output);
    if actual != expected {
        return Err(UpscaleError::UnexpectedOutput { expected, actual });
    }

    progress.finish(&format!(
        "Aspect ratio preserved, upscaled to {}x{}",
        actual.width, actual.height
    ));

    Ok(UpscaleReport {
        image: output,
        working,
        engine: model.name().to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Records every progress call.
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub(crate) ticks: Vec<u8>,
        pub(crate) messages: Vec<String>,
        pub(crate) finished: Option<String>,
    }

    impl Progress for Recorder {
        fn update(&mut self, percent: u8, message: &str) {
            self.ticks.push(percent);
            self.messages.push(message.to_string());
        }

        fn finish(&mut self, message: &str) {
            self.finished = Some(message.to_string());
        }
    }

    /// Engine that returns an image of the wrong size.
    struct Shrinker;

    impl SuperResolution for Shrinker {
        fn name(&self) -> &'static str {
            "shrinker"
        }

        fn scale(&self) -> u32 {
            4
        }

        fn upsample(&mut self, input: &RgbImage) -> Result<RgbImage, UpscaleError> {
            Ok(RgbImage::new(input.width(), input.height()))
        }
    }

    /// Engine that always fails.
    struct Broken;

    impl SuperResolution for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn scale(&self) -> u32 {
            4
        }

        fn upsample(&mut self, _input: &RgbImage) -> Result<RgbImage, UpscaleError> {
            Err(UpscaleError::Inference("session crashed".to_string()))
        }
    }

    pub(crate) fn quiet_config() -> PipelineConfig {
        PipelineConfig {
            progress_delay: Duration::ZERO,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn progress_ticks_every_ten_percent() {
        let mut rec = Recorder::default();
        run_progress(&mut rec, 10, Duration::ZERO, "EDSR");
        assert_eq!(rec.ticks, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
        assert!(rec.messages.iter().all(|m| m == "Upscaling with EDSR..."));
    }

    #[test]
    fn progress_always_ends_at_100() {
        let mut rec = Recorder::default();
        run_progress(&mut rec, 30, Duration::ZERO, "x");
        assert_eq!(rec.ticks, vec![0, 30, 60, 90, 100]);
    }

    #[test]
    fn resample_upscaler_scales_by_factor() {
        let mut engine = ResampleUpscaler::new(4);
        let out = engine.upsample(&RgbImage::new(10, 5)).unwrap();
        assert_eq!(out.dimensions(), (40, 20));
    }

    #[test]
    fn resample_upscaler_rejects_zero_scale() {
        let mut engine = ResampleUpscaler::new(0);
        assert!(engine.upsample(&RgbImage::new(2, 2)).is_err());
    }

    #[test]
    fn resample_upscaler_rejects_scale_above_max() {
        let mut engine = ResampleUpscaler::new(ResampleUpscaler::MAX_SCALE + 1);
        let err = engine.upsample(&RgbImage::new(2, 2)).unwrap_err();
        assert!(matches!(err, UpscaleError::Inference(ref s) if s.contains("scale")));
    }

    #[test]
    fn output_size_bounds_pixels() {
        assert_eq!(
            output_size(Dimensions::new(270, 540), 4).unwrap(),
            Dimensions::new(1080, 2160)
        );
        assert!(output_size(Dimensions::new(u32::MAX, 1), 2).is_err());
        assert!(output_size(Dimensions::new(8192, 8192), 4).is_err());
    }

    #[test]
    fn upscale_refuses_oversized_output_before_running() {
        let image = RgbImage::new(20, 40);
        let config = PipelineConfig {
            max_width: u32::MAX,
            ..quiet_config()
        };
        let mut rec = Recorder::default();
        let err = upscale(&image, &mut Broken, &config, &mut rec).unwrap_err();
        assert!(matches!(err, UpscaleError::Inference(ref s) if s.contains("output pixels")));
        assert!(rec.ticks.is_empty());
    }

    #[test]
    fn upscale_runs_on_working_size() {
        let image = RgbImage::from_pixel(1000, 2000, image::Rgb([90, 120, 30]));
        let mut engine = ResampleUpscaler::new(4);
        let mut rec = Recorder::default();
        let report = upscale(&image, &mut engine, &quiet_config(), &mut rec).unwrap();
        assert_eq!(report.working, Dimensions::new(270, 540));
        assert_eq!(report.image.dimensions(), (1080, 2160));
        assert_eq!(report.engine, "resample");
        assert_eq!(rec.ticks.len(), 11);
        assert_eq!(
            rec.finished.as_deref(),
            Some("Aspect ratio preserved, upscaled to 1080x2160")
        );
    }

    #[test]
    fn upscale_rejects_wrong_output_size() {
        let image = RgbImage::new(100, 100);
        let mut rec = Recorder::default();
        let err = upscale(&image, &mut Shrinker, &quiet_config(), &mut rec).unwrap_err();
        assert_eq!(
            err,
            UpscaleError::UnexpectedOutput {
                expected: Dimensions::new(2160, 2160),
                actual: Dimensions::new(540, 540),
            }
        );
        assert!(rec.finished.is_none());
    }

    #[test]
    fn upscale_propagates_engine_failure() {
        let image = RgbImage::new(64, 64);
        let err = upscale(&image, &mut Broken, &quiet_config(), &mut NoProgress).unwrap_err();
        assert!(matches!(err, UpscaleError::Inference(ref s) if s == "session crashed"));
    }
}
