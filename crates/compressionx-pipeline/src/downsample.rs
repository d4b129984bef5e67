//! Resizing to the bounded working size.
//!
//! Super-resolution cost grows with input resolution, so the compressed
//! image is first resized so its longer axis is exactly `max_width`
//! pixels, preserving aspect ratio. The model then runs on that working
//! image.

use std::fmt;

use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::types::Dimensions;

/// Resampling filter used for the working resize.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality, with
/// [`WorkingFilter::Area`] (the default) last.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkingFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
    /// Area averaging: each output pixel is the coverage-weighted mean of
    /// the source pixels beneath it. Moiré-free when shrinking; falls back
    /// to bilinear when enlarging.
    #[default]
    Area,
}

impl WorkingFilter {
    /// Convert to the `image` crate's `FilterType`.
    ///
    /// [`WorkingFilter::Area`] maps to `Triangle`, which is what area
    /// averaging degrades to when enlarging.
    const fn to_image_filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle | Self::Area => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for WorkingFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
            Self::Area => f.write_str("Area"),
        }
    }
}

/// Compute the working size for a `width` x `height` image.
///
/// Landscape and square images get `max_width` columns and a height of
/// `round(max_width / (width / height))`; portrait images get `max_width`
/// rows and a width of `round(max_width * (width / height))`. Neither
/// axis drops below one pixel.
///
/// The longer axis is always set to `max_width`, so images smaller than
/// the bound are enlarged to it.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn working_size(width: u32, height: u32, max_width: u32) -> Dimensions {
    let aspect_ratio = f64::from(width.max(1)) / f64::from(height.max(1));
    let bound = f64::from(max_width);
    let (w, h) = if width >= height {
        (max_width, (bound / aspect_ratio).round() as u32)
    } else {
        ((bound * aspect_ratio).round() as u32, max_width)
    };
    Dimensions::new(w.max(1), h.max(1))
}

/// Resize `image` to `target` with the given filter.
///
/// Returns a copy when `image` is already at the target size.
#[must_use]
pub fn resize_to(image: &RgbImage, target: Dimensions, filter: WorkingFilter) -> RgbImage {
    if Dimensions::of(image) == target {
        return image.clone();
    }
    let shrinking = target.width <= image.width() && target.height <= image.height();
    if filter == WorkingFilter::Area && shrinking {
        return resize_area(image, target);
    }
    image::imageops::resize(
        image,
        target.width,
        target.height,
        filter.to_image_filter(),
    )
}

/// Shrink `image` to `target` by area averaging.
///
/// Separable: rows are reduced first into an `f32` buffer, then columns.
/// Each output sample is the mean of the source samples it covers,
/// weighted by the fraction of each source pixel inside its footprint.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn resize_area(image: &RgbImage, target: Dimensions) -> RgbImage {
    let (src_w, src_h) = image.dimensions();
    let (dst_w, dst_h) = (target.width.max(1), target.height.max(1));
    let x_weights = area_weights(src_w, dst_w);
    let y_weights = area_weights(src_h, dst_h);

    // Horizontal pass: src_h rows of dst_w samples.
    let row_len = dst_w as usize * 3;
    let mut rows = vec![0.0_f32; row_len * src_h as usize];
    for y in 0..src_h {
        let out_row = &mut rows[y as usize * row_len..(y as usize + 1) * row_len];
        for (dx, taps) in x_weights.iter().enumerate() {
            let mut acc = [0.0_f32; 3];
            for &(sx, weight) in taps {
                let Rgb(px) = *image.get_pixel(sx, y);
                for c in 0..3 {
                    acc[c] += f32::from(px[c]) * weight;
                }
            }
            out_row[dx * 3..dx * 3 + 3].copy_from_slice(&acc);
        }
    }

    // Vertical pass.
    RgbImage::from_fn(dst_w, dst_h, |x, y| {
        let mut acc = [0.0_f32; 3];
        for &(sy, weight) in &y_weights[y as usize] {
            let base = sy as usize * row_len + x as usize * 3;
            for c in 0..3 {
                acc[c] += rows[base + c] * weight;
            }
        }
        Rgb(acc.map(|v| v.round().clamp(0.0, 255.0) as u8))
    })
}

/// For each of `dst` output samples, the source indices it covers and
/// the normalized weight of each.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn area_weights(src: u32, dst: u32) -> Vec<Vec<(u32, f32)>> {
    let scale = f64::from(src) / f64::from(dst);
    (0..dst)
        .map(|i| {
            let start = f64::from(i) * scale;
            let end = start + scale;
            let first = start.floor() as u32;
            let last = (end.ceil() as u32).min(src);
            (first..last)
                .filter_map(|k| {
                    let overlap = end.min(f64::from(k + 1)) - start.max(f64::from(k));
                    (overlap > 1e-9).then(|| (k, (overlap / scale) as f32))
                })
                .collect()
        })
        .collect()
}
