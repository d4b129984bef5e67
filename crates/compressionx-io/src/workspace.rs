//! The on-disk layout of one upload.
//!
//! Every upload lands in a single temp directory under three names derived
//! from the uploaded file name:
//!
//! | file | path |
//! |---|---|
//! | original | `<root>/<name>` |
//! | compressed | `<root>/compressed_<name>` |
//! | upscaled | `<root>/ai_upscaled_<name>` |
//!
//! Two uploads with the same name share paths.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::IoError;

/// Prefix of the compressed copy.
pub const COMPRESSED_PREFIX: &str = "compressed_";

/// Prefix of the upscaled copy.
pub const UPSCALED_PREFIX: &str = "ai_upscaled_";

/// Upload extensions accepted by [`crate::handle_upload`].
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Check whether a filename has an allowed image extension.
#[must_use]
pub fn has_allowed_extension(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(_, ext)| {
        ALLOWED_EXTENSIONS
            .iter()
            .any(|a| a.eq_ignore_ascii_case(ext))
    })
}

/// Reduce an uploaded file name to its final path component.
///
/// Both `/` and `\` count as separators, whatever the host platform.
///
/// # Errors
///
/// Returns [`IoError::InvalidFileName`] if nothing usable is left.
pub fn sanitize_file_name(name: &str) -> Result<&str, IoError> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    if base.is_empty() || base == "." || base == ".." {
        return Err(IoError::InvalidFileName(name.to_string()));
    }
    Ok(base)
}

/// Directory that holds every upload's files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Default directory, relative to the current directory.
    pub const DEFAULT_ROOT: &str = "temp";

    /// Use `root` as the workspace directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The workspace directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Write`] if it cannot be created.
    pub fn ensure(&self) -> Result<(), IoError> {
        std::fs::create_dir_all(&self.root).map_err(|source| IoError::Write {
            path: self.root.clone(),
            source,
        })
    }

    /// Paths for an upload named `file_name`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidFileName`] if the name has no final
    /// component.
    pub fn paths(&self, file_name: &str) -> Result<UploadPaths, IoError> {
        UploadPaths::for_upload(&self.root, file_name)
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ROOT)
    }
}

/// Where one upload's three files live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPaths {
    /// The uploaded bytes, unmodified.
    pub original: PathBuf,
    /// Output of the re-encode passes.
    pub compressed: PathBuf,
    /// Output of super-resolution.
    pub upscaled: PathBuf,
}

impl UploadPaths {
    /// Derive the three paths under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidFileName`] if the name has no final
    /// component.
    pub fn for_upload(root: &Path, file_name: &str) -> Result<Self, IoError> {
        let name = sanitize_file_name(file_name)?;
        Ok(Self {
            original: root.join(name),
            compressed: root.join(format!("{COMPRESSED_PREFIX}{name}")),
            upscaled: root.join(format!("{UPSCALED_PREFIX}{name}")),
        })
    }
}
