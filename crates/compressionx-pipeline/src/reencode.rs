//! Lossy re-encoding.
//!
//! Pushes an image through an encoder at a given quality and returns the
//! encoded bytes. Applied repeatedly, each pass decodes the previous
//! pass's output, so losses compound the same way they do when a file is
//! re-saved several times.

use std::fmt;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Output codec for a re-encode pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodeFormat {
    /// Baseline JPEG. Lossy; honours the quality setting.
    #[default]
    Jpeg,
    /// PNG at maximum compression with adaptive filtering. Lossless;
    /// the quality setting has no effect.
    Png,
}

impl EncodeFormat {
    /// Pick a format from a file extension (case-insensitive, without the dot).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnsupportedFormat`] for anything other
    /// than `jpg`, `jpeg` or `png`.
    pub fn from_extension(ext: &str) -> Result<Self, PipelineError> {
        if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") {
            Ok(Self::Jpeg)
        } else if ext.eq_ignore_ascii_case("png") {
            Ok(Self::Png)
        } else {
            Err(PipelineError::UnsupportedFormat(ext.to_string()))
        }
    }

    /// Pick a format from the extension of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnsupportedFormat`] if the path has no
    /// extension or an unsupported one.
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| PipelineError::UnsupportedFormat(path.display().to_string()))?;
        Self::from_extension(ext)
    }

    /// Whether this format discards information.
    #[must_use]
    pub const fn is_lossy(self) -> bool {
        matches!(self, Self::Jpeg)
    }
}

impl fmt::Display for EncodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jpeg => f.write_str("JPEG"),
            Self::Png => f.write_str("PNG"),
        }
    }
}

/// Encode an already-decoded image.
///
/// JPEG has no alpha channel, so images with alpha are flattened to RGB
/// (grayscale images stay single-channel).
///
/// # Errors
///
/// Returns [`PipelineError::ImageEncode`] if the encoder fails.
pub fn encode(
    image: &DynamicImage,
    quality: u8,
    format: EncodeFormat,
) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Vec::new();
    match format {
        EncodeFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            let written = if image.color().has_color() {
                let rgb = image.to_rgb8();
                encoder.write_image(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    ExtendedColorType::Rgb8,
                )
            } else {
                let luma = image.to_luma8();
                encoder.write_image(
                    luma.as_raw(),
                    luma.width(),
                    luma.height(),
                    ExtendedColorType::L8,
                )
            };
            written.map_err(PipelineError::ImageEncode)?;
        }
        EncodeFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive);
            image
                .write_with_encoder(encoder)
                .map_err(PipelineError::ImageEncode)?;
        }
    }
    Ok(buf)
}

/// Decode `bytes` and encode them again at `quality`.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] or [`PipelineError::ImageDecode`]
/// when the input cannot be decoded, and [`PipelineError::ImageEncode`]
/// when the encoder fails.
pub fn reencode(bytes: &[u8], quality: u8, format: EncodeFormat) -> Result<Vec<u8>, PipelineError> {
    let image = crate::decode::decode(bytes)?;
    encode(&image, quality, format)
}

/// Apply [`reencode`] `passes` times, each pass consuming the previous
/// pass's output. Zero passes returns the input unchanged.
///
/// # Errors
///
/// Propagates the first failing pass's error.
pub fn compress(
    bytes: &[u8],
    quality: u8,
    passes: u8,
    format: EncodeFormat,
) -> Result<Vec<u8>, PipelineError> {
    let mut current = bytes.to_vec();
    for _ in 0..passes {
        current = reencode(&current, quality, format)?;
    }
    Ok(current)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// A smooth gradient with deterministic grain, standing in for
    /// photographic content.
    fn photo_like(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
            let grain = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729)) % 23;
            #[allow(clippy::cast_possible_truncation)]
            let px = |base: u32| ((base + grain) % 256) as u8;
            image::Rgb([px(x * 255 / width), px(y * 255 / height), px((x + y) % 256)])
        }))
    }

    fn png_bytes(image: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image
            .write_with_encoder(PngEncoder::new(&mut buf))
            .unwrap();
        buf
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(EncodeFormat::from_extension("jpg").unwrap(), EncodeFormat::Jpeg);
        assert_eq!(EncodeFormat::from_extension("JPEG").unwrap(), EncodeFormat::Jpeg);
        assert_eq!(EncodeFormat::from_extension("Png").unwrap(), EncodeFormat::Png);
        assert!(matches!(
            EncodeFormat::from_extension("gif"),
            Err(PipelineError::UnsupportedFormat(ref s)) if s == "gif"
        ));
    }

    #[test]
    fn format_from_path_without_extension_is_unsupported() {
        assert!(matches!(
            EncodeFormat::from_path(Path::new("temp/noext")),
            Err(PipelineError::UnsupportedFormat(_))
        ));
        assert_eq!(
            EncodeFormat::from_path(Path::new("temp/compressed_cat.jpeg")).unwrap(),
            EncodeFormat::Jpeg
        );
    }

    #[test]
    fn jpeg_at_quality_40_is_smaller_than_lossless() {
        let image = photo_like(256, 192);
        let png = png_bytes(&image);
        let jpeg = reencode(&png, 40, EncodeFormat::Jpeg).unwrap();
        assert!(
            jpeg.len() <= png.len(),
            "jpeg {} bytes, png {} bytes",
            jpeg.len(),
            png.len()
        );
    }

    #[test]
    fn lower_quality_produces_fewer_bytes() {
        let png = png_bytes(&photo_like(128, 128));
        let low = reencode(&png, 10, EncodeFormat::Jpeg).unwrap();
        let high = reencode(&png, 95, EncodeFormat::Jpeg).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn reencode_preserves_dimensions() {
        let png = png_bytes(&photo_like(33, 17));
        let jpeg = reencode(&png, 40, EncodeFormat::Jpeg).unwrap();
        let decoded = crate::decode::decode(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (33, 17));
    }

    #[test]
    fn jpeg_flattens_alpha() {
        let rgba = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            8,
            8,
            image::Rgba([200, 10, 10, 128]),
        ));
        let jpeg = encode(&rgba, 40, EncodeFormat::Jpeg).unwrap();
        let decoded = crate::decode::decode(&jpeg).unwrap();
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn jpeg_keeps_grayscale_single_channel() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(8, 8, image::Luma([90])));
        let jpeg = encode(&gray, 40, EncodeFormat::Jpeg).unwrap();
        let decoded = crate::decode::decode(&jpeg).unwrap();
        assert!(!decoded.color().has_color());
    }

    #[test]
    fn png_is_lossless_regardless_of_quality() {
        let image = photo_like(40, 30);
        let png = encode(&image, 1, EncodeFormat::Png).unwrap();
        let decoded = crate::decode::decode(&png).unwrap();
        assert_eq!(decoded.to_rgb8(), image.to_rgb8());
    }

    #[test]
    fn compress_zero_passes_is_identity() {
        let png = png_bytes(&photo_like(16, 16));
        assert_eq!(compress(&png, 40, 0, EncodeFormat::Jpeg).unwrap(), png);
    }

    #[test]
    fn compress_two_passes_matches_manual_chain() {
        let png = png_bytes(&photo_like(64, 48));
        let first = reencode(&png, 40, EncodeFormat::Jpeg).unwrap();
        let second = reencode(&first, 40, EncodeFormat::Jpeg).unwrap();
        assert_eq!(compress(&png, 40, 2, EncodeFormat::Jpeg).unwrap(), second);
    }

    #[test]
    fn compress_empty_input_fails() {
        assert!(matches!(
            compress(&[], 40, 2, EncodeFormat::Jpeg),
            Err(PipelineError::EmptyInput)
        ));
    }

    #[test]
    fn display_names() {
        assert_eq!(EncodeFormat::Jpeg.to_string(), "JPEG");
        assert_eq!(EncodeFormat::Png.to_string(), "PNG");
        assert!(EncodeFormat::Jpeg.is_lossy());
        assert!(!EncodeFormat::Png.is_lossy());
    }
}
