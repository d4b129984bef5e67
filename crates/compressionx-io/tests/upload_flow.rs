//! Integration test: a whole upload, from bytes to three files on disk.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use compressionx_io::{Engine, IoError, UpscaleFileOutcome, Workspace, handle_upload};
use compressionx_model::ModelSpec;
use compressionx_pipeline::{Dimensions, PipelineConfig, Progress};

fn scratch(name: &str) -> PathBuf {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../target/compressionx-upload-tests")
        .join(name);
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// A 1000x2000 opaque portrait, PNG-encoded.
fn portrait_png() -> Vec<u8> {
    let img = image::RgbImage::from_fn(1000, 2000, |x, y| {
        #[allow(clippy::cast_possible_truncation)]
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 251) as u8])
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_with_encoder(image::codecs::png::PngEncoder::new(&mut buf))
        .unwrap();
    buf
}

fn quiet() -> PipelineConfig {
    PipelineConfig {
        progress_delay: Duration::ZERO,
        ..PipelineConfig::default()
    }
}

#[derive(Default)]
struct Ticks(Vec<u8>, Option<String>);

impl Progress for Ticks {
    fn update(&mut self, percent: u8, _message: &str) {
        self.0.push(percent);
    }

    fn finish(&mut self, message: &str) {
        self.1 = Some(message.to_string());
    }
}

#[test]
fn upload_without_model_shows_compressed_image() {
    let root = scratch("no_model");
    let workspace = Workspace::new(&root);
    let bytes = portrait_png();
    let engine = Engine::Onnx(ModelSpec::default().in_dir(root.join("models")));

    let result = handle_upload(
        &workspace,
        "portrait.png",
        &bytes,
        &quiet(),
        &engine,
        &mut Ticks::default(),
    )
    .expect("upload should succeed without a model");

    assert_eq!(result.original, root.join("portrait.png"));
    assert_eq!(std::fs::read(&result.original).unwrap(), bytes);
    assert_eq!(result.compressed, root.join("compressed_portrait.png"));
    assert!(result.compressed.exists());
    assert!(!result.upscaled.is_upscaled());
    assert_eq!(result.upscaled.path(), result.compressed);
    assert!(!root.join("ai_upscaled_portrait.png").exists());
}

#[test]
fn upload_with_classical_engine_writes_all_three() {
    let root = scratch("classical");
    let workspace = Workspace::new(&root);
    let mut ticks = Ticks::default();

    let result = handle_upload(
        &workspace,
        "portrait.jpg",
        &portrait_png(),
        &quiet(),
        &Engine::Classical { scale: 4 },
        &mut ticks,
    )
    .unwrap();

    let compressed_len = std::fs::metadata(&result.compressed).unwrap().len();
    let original_len = std::fs::metadata(&result.original).unwrap().len();
    assert!(compressed_len < original_len);

    match &result.upscaled {
        UpscaleFileOutcome::Upscaled { path, dimensions } => {
            assert_eq!(path, &root.join("ai_upscaled_portrait.jpg"));
            assert_ne!(path, &result.original);
            assert_eq!(*dimensions, Dimensions::new(1080, 2160));
            assert_eq!(image::image_dimensions(path).unwrap(), (1080, 2160));
        }
        UpscaleFileOutcome::Fallback { reason, .. } => {
            unreachable!("classical engine fell back: {reason}")
        }
    }
    assert_eq!(ticks.0.last(), Some(&100));
    assert_eq!(
        ticks.1.as_deref(),
        Some("Aspect ratio preserved, upscaled to 1080x2160")
    );
}

#[test]
fn upload_rejects_unsupported_type() {
    let root = scratch("gif");
    let err = handle_upload(
        &Workspace::new(&root),
        "anim.gif",
        b"GIF89a",
        &quiet(),
        &Engine::Classical { scale: 4 },
        &mut Ticks::default(),
    )
    .unwrap_err();
    assert!(matches!(err, IoError::UnsupportedFileType(_)));
    assert!(!root.exists());
}

#[test]
fn upload_name_cannot_escape_workspace() {
    let root = scratch("escape").join("inner");
    let result = handle_upload(
        &Workspace::new(&root),
        "../../escape.png",
        &portrait_png(),
        &quiet(),
        &Engine::Classical { scale: 2 },
        &mut Ticks::default(),
    )
    .unwrap();
    assert_eq!(result.original, root.join("escape.png"));
}

#[test]
fn upload_of_corrupt_bytes_fails_at_compression() {
    let root = scratch("corrupt");
    let err = handle_upload(
        &Workspace::new(&root),
        "bad.png",
        b"not really a png",
        &quiet(),
        &Engine::Classical { scale: 2 },
        &mut Ticks::default(),
    )
    .unwrap_err();
    assert!(matches!(err, IoError::Pipeline(_)), "{err}");
    assert!(root.join("bad.png").exists());
}
