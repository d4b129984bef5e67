//! The full upload flow: save, compress, upscale.

use std::fs;
use std::path::PathBuf;

use compressionx_pipeline::{PipelineConfig, Progress};
use serde::{Deserialize, Serialize};

use crate::error::IoError;
use crate::files::{Engine, UpscaleFileOutcome, compress_file, upscale_file};
use crate::workspace::{Workspace, has_allowed_extension};

/// The three images of one upload, on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// The uploaded bytes, unmodified.
    pub original: PathBuf,
    /// The re-encoded image.
    pub compressed: PathBuf,
    /// The upscaled image, or the compressed one if upscaling failed.
    pub upscaled: UpscaleFileOutcome,
}

/// Handle one uploaded image.
///
/// # Steps
///
/// 1. Check the extension and the config
/// 2. Save `bytes` unmodified to `<root>/<name>`
/// 3. Compress into `<root>/compressed_<name>`, then re-compress that
///    file in place for each further pass
/// 4. Upscale into `<root>/ai_upscaled_<name>`
///
/// # Errors
///
/// Returns [`IoError::UnsupportedFileType`] for anything but PNG or JPEG,
/// [`IoError::InvalidFileName`] for a name with no final component, and
/// any error from saving or compressing. Upscale failures are not errors;
/// see [`UpscaleFileOutcome::Fallback`].
pub fn handle_upload(
    workspace: &Workspace,
    file_name: &str,
    bytes: &[u8],
    config: &PipelineConfig,
    engine: &Engine,
    progress: &mut dyn Progress,
) -> Result<UploadResult, IoError> {
    if !has_allowed_extension(file_name) {
        return Err(IoError::UnsupportedFileType(file_name.to_string()));
    }
    config.validate()?;

    workspace.ensure()?;
    let paths = workspace.paths(file_name)?;
    fs::write(&paths.original, bytes).map_err(|source| IoError::Write {
        path: paths.original.clone(),
        source,
    })?;
    tracing::info!(path = %paths.original.display(), bytes = bytes.len(), "saved upload");

    let compressed = compress_file(&paths.original, &paths.compressed, config.quality, 1)?;
    for _ in 1..config.passes {
        compress_file(&compressed, &compressed, config.quality, 1)?;
    }

    let upscaled = upscale_file(&compressed, &paths.upscaled, engine, config, progress);
    if let UpscaleFileOutcome::Fallback { reason, .. } = &upscaled {
        tracing::debug!(%reason, "showing the compressed image in place of the upscaled one");
    }

    Ok(UploadResult {
        original: paths.original,
        compressed,
        upscaled,
    })
}
