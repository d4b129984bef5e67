//! Conversions between `RgbImage` and NCHW `f32` tensors.

use compressionx_pipeline::{Dimensions, UpscaleError};
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use ndarray::{Array4, ArrayView4};

// BT.601 full-range YCbCr, as used by JPEG.
const KR: f32 = 0.299;
const KG: f32 = 0.587;
const KB: f32 = 0.114;

/// Interleaved RGB to a `1x3xHxW` tensor, scaled so 255 maps to `range`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn rgb_to_nchw(image: &RgbImage, range: f32) -> Array4<f32> {
    let (w, h) = image.dimensions();
    let k = range / 255.0;
    Array4::from_shape_fn((1, 3, h as usize, w as usize), |(_, c, y, x)| {
        f32::from(image.get_pixel(x as u32, y as u32)[c]) * k
    })
}

/// Y channel to a `1x1xHxW` tensor, scaled so 255 maps to `range`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn luma_to_nchw(image: &RgbImage, range: f32) -> Array4<f32> {
    let (w, h) = image.dimensions();
    let k = range / 255.0;
    Array4::from_shape_fn((1, 1, h as usize, w as usize), |(_, _, y, x)| {
        luma(*image.get_pixel(x as u32, y as u32)) * k
    })
}

/// A `1x3xHxW` tensor back to RGB, clamping to `0..=255`.
///
/// # Errors
///
/// Returns [`UpscaleError::Inference`] if the tensor is not
/// `1x3xHxW`.
pub fn nchw_to_rgb(tensor: ArrayView4<'_, f32>, range: f32) -> Result<RgbImage, UpscaleError> {
    let size = spatial_size(tensor, 3)?;
    let k = 255.0 / range;
    Ok(RgbImage::from_fn(size.width, size.height, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([0, 1, 2].map(|c| to_u8(tensor[[0, c, y, x]] * k)))
    }))
}

/// Combine a super-resolved `1x1xHxW` Y tensor with the chroma of
/// `source`, resampled to the same size.
///
/// # Errors
///
/// Returns [`UpscaleError::Inference`] if the tensor is not `1x1xHxW`.
pub fn merge_luma(
    tensor: ArrayView4<'_, f32>,
    range: f32,
    source: &RgbImage,
) -> Result<RgbImage, UpscaleError> {
    let size = spatial_size(tensor, 1)?;
    let chroma = image::imageops::resize(source, size.width, size.height, FilterType::CatmullRom);
    let k = 255.0 / range;
    Ok(RgbImage::from_fn(size.width, size.height, |x, y| {
        let y_value = tensor[[0, 0, y as usize, x as usize]] * k;
        let (cb, cr) = chroma_of(*chroma.get_pixel(x, y));
        from_ycbcr(y_value, cb, cr)
    }))
}

fn spatial_size(tensor: ArrayView4<'_, f32>, channels: usize) -> Result<Dimensions, UpscaleError> {
    let shape = tensor.shape();
    if shape[0] != 1 || shape[1] != channels {
        return Err(UpscaleError::Inference(format!(
            "expected a 1x{channels}xHxW output tensor, got {shape:?}"
        )));
    }
    let height = u32::try_from(shape[2])
        .map_err(|_| UpscaleError::Inference(format!("output height {} too large", shape[2])))?;
    let width = u32::try_from(shape[3])
        .map_err(|_| UpscaleError::Inference(format!("output width {} too large", shape[3])))?;
    Ok(Dimensions::new(width, height))
}

fn luma(Rgb([r, g, b]): Rgb<u8>) -> f32 {
    KR * f32::from(r) + KG * f32::from(g) + KB * f32::from(b)
}

fn chroma_of(Rgb([r, g, b]): Rgb<u8>) -> (f32, f32) {
    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
    let y = KR * r + KG * g + KB * b;
    let cb = (b - y) / (2.0 * (1.0 - KB));
    let cr = (r - y) / (2.0 * (1.0 - KR));
    (cb, cr)
}

fn from_ycbcr(y: f32, cb: f32, cr: f32) -> Rgb<u8> {
    let r = y + 2.0 * (1.0 - KR) * cr;
    let b = y + 2.0 * (1.0 - KB) * cb;
    let g = (y - KR * r - KB * b) / KG;
    Rgb([to_u8(r), to_u8(g), to_u8(b)])
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
