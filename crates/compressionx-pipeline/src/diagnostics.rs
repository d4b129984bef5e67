//! Pipeline diagnostics: timing, sizes and quality metrics for each stage.
//!
//! Every stage of [`process_with_diagnostics`] is timed through a
//! caller-supplied [`Clock`], keeping this crate free of any particular
//! time source. Durations are serialized as fractional seconds (`f64`)
//! for JSON compatibility, since `std::time::Duration` does not implement
//! serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;
use crate::types::{
    Dimensions, PipelineConfig, PipelineError, ProcessResult, RgbImage, UpscaleOutcome,
};
use crate::upscale::{Progress, SuperResolution};

/// Serde support for `std::time::Duration` as fractional seconds.
pub(crate) mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// A monotonic time source.
pub trait Clock {
    /// An opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: image decoding.
    pub decode: StageDiagnostics,
    /// Stage 2: every re-encode pass.
    pub compress: StageDiagnostics,
    /// Stage 3: working resize, progress and inference.
    pub upscale: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
    },
    /// Re-encode metrics.
    Compress {
        /// Encoder quality.
        quality: u8,
        /// Codec name.
        format: String,
        /// Encoded size after each pass.
        pass_bytes: Vec<usize>,
    },
    /// Super-resolution metrics.
    Upscale {
        /// Engine name, or `None` when the stage fell back.
        engine: Option<String>,
        /// Size the engine ran on.
        working: Option<Dimensions>,
        /// Output size.
        output: Option<Dimensions>,
        /// Failure reason when the stage fell back.
        fallback: Option<String>,
    },
}

/// High-level summary for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image dimensions.
    pub dimensions: Dimensions,
    /// Size of the source bytes.
    pub original_bytes: usize,
    /// Size of the final compressed bytes.
    pub compressed_bytes: usize,
    /// `original_bytes / compressed_bytes`.
    pub compression_ratio: f64,
    /// Peak signal-to-noise ratio of the compressed image against the
    /// original, in dB. `None` when the two are pixel-identical.
    pub compressed_psnr: Option<f64>,
    /// Whether the super-resolution stage produced an image.
    pub upscaled: bool,
}

/// Run the full pipeline, timing each stage with `clock`.
///
/// # Errors
///
/// Returns the same errors as [`crate::process`].
pub fn process_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    model: &mut dyn SuperResolution,
    progress: &mut dyn Progress,
    clock: &C,
) -> Result<(ProcessResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();

    let t = clock.now();
    let decoded = Pipeline::new(image_bytes.to_vec(), config.clone()).decode()?;
    let decode = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Decode {
            input_bytes: image_bytes.len(),
            width: decoded.dimensions().width,
            height: decoded.dimensions().height,
        },
    };
    let original_rgb = decoded.image().to_rgb8();

    let t = clock.now();
    let compressed = decoded.compress()?;
    let compress = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Compress {
            quality: config.quality,
            format: config.format.to_string(),
            pass_bytes: compressed.pass_sizes().to_vec(),
        },
    };
    let compressed_psnr = psnr(&original_rgb, compressed.decoded());

    let t = clock.now();
    let finished = compressed.upscale(model, progress);
    let result = finished.into_result();
    let upscale = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: upscale_metrics(&result.upscaled),
    };

    let summary = PipelineSummary {
        dimensions: result.original.dimensions,
        original_bytes: result.original.bytes.len(),
        compressed_bytes: result.compressed.bytes.len(),
        compression_ratio: ratio(result.original.bytes.len(), result.compressed.bytes.len()),
        compressed_psnr,
        upscaled: result.upscaled.is_upscaled(),
    };

    let diagnostics = PipelineDiagnostics {
        decode,
        compress,
        upscale,
        total_duration: clock.elapsed(&start),
        summary,
    };
    Ok((result, diagnostics))
}

fn upscale_metrics(outcome: &UpscaleOutcome) -> StageMetrics {
    match outcome {
        UpscaleOutcome::Upscaled {
            image,
            working,
            engine,
        } => StageMetrics::Upscale {
            engine: Some(engine.clone()),
            working: Some(*working),
            output: Some(Dimensions::of(image)),
            fallback: None,
        },
        UpscaleOutcome::Fallback { reason } => StageMetrics::Upscale {
            engine: None,
            working: None,
            output: None,
            fallback: Some(reason.to_string()),
        },
    }
}

/// PSNR between two same-sized images, `None` if they are identical or
/// differently sized.
#[must_use]
pub fn psnr(reference: &RgbImage, candidate: &RgbImage) -> Option<f64> {
    if reference.dimensions() != candidate.dimensions() || reference == candidate {
        return None;
    }
    let value = imageproc::stats::peak_signal_to_noise_ratio(reference, candidate);
    value.is_finite().then_some(value)
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {} ({} pixels)",
            self.summary.dimensions,
            self.summary.dimensions.pixel_count(),
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in [
            ("Decode", &self.decode),
            ("Compress", &self.compress),
            ("Upscale", &self.upscale),
        ] {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        let psnr = self
            .summary
            .compressed_psnr
            .map_or_else(|| "n/a".to_string(), |v| format!("{v:.2} dB"));
        lines.push(format!(
            "Bytes: {} -> {} (x{:.2})  |  PSNR: {psnr}  |  Upscaled: {}",
            self.summary.original_bytes,
            self.summary.compressed_bytes,
            self.summary.compression_ratio,
            if self.summary.upscaled { "yes" } else { "no" },
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Compress {
            quality,
            format,
            pass_bytes,
        } => {
            let passes: Vec<String> = pass_bytes.iter().map(ToString::to_string).collect();
            format!("{format} q={quality} passes=[{}]", passes.join(", "))
        }
        StageMetrics::Upscale {
            engine,
            working,
            output,
            fallback,
        } => match (engine, working, output, fallback) {
            (Some(engine), Some(working), Some(output), _) => {
                format!("{engine} {working} -> {output}")
            }
            (_, _, _, Some(reason)) => format!("fallback: {reason}"),
            _ => String::new(),
        },
    }
}
