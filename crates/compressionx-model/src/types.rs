//! Model selection: which network, at which scale, from which file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use compressionx_pipeline::UpscaleError;
use serde::{Deserialize, Serialize};

/// Super-resolution network families with a known tensor contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// Enhanced Deep Residual network. RGB in, RGB out, pixel values in
    /// `0..=255`.
    Edsr,
    /// Efficient sub-pixel CNN. Luminance only.
    Espcn,
    /// Fast SR CNN. Luminance only.
    Fsrcnn,
    /// Laplacian pyramid network. Luminance only.
    Lapsrn,
    /// Real-ESRGAN. RGB in, RGB out, values in `0..=1`.
    #[serde(rename = "realesrgan")]
    RealEsrgan,
}

/// Which channels a network consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    /// A `1x3xHxW` RGB tensor.
    Rgb,
    /// A `1x1xHxW` tensor holding the Y channel of YCbCr. Chroma is
    /// resampled classically and merged back.
    Luma,
}

impl Architecture {
    /// Every known architecture.
    pub const ALL: [Self; 5] = [
        Self::Edsr,
        Self::Espcn,
        Self::Fsrcnn,
        Self::Lapsrn,
        Self::RealEsrgan,
    ];

    /// Scale factors published models of this family exist for.
    #[must_use]
    pub const fn supported_scales(self) -> &'static [u32] {
        match self {
            Self::Edsr | Self::Espcn | Self::Fsrcnn => &[2, 3, 4],
            Self::Lapsrn => &[2, 4, 8],
            Self::RealEsrgan => &[2, 4],
        }
    }

    /// Value a full-intensity pixel has in the input tensor.
    #[must_use]
    pub const fn input_range(self) -> f32 {
        match self {
            Self::Edsr => 255.0,
            Self::Espcn | Self::Fsrcnn | Self::Lapsrn | Self::RealEsrgan => 1.0,
        }
    }

    /// Channel layout of the input and output tensors.
    #[must_use]
    pub const fn channels(self) -> Channels {
        match self {
            Self::Edsr | Self::RealEsrgan => Channels::Rgb,
            Self::Espcn | Self::Fsrcnn | Self::Lapsrn => Channels::Luma,
        }
    }

    /// Conventional capitalization, as used in model file names.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Edsr => "EDSR",
            Self::Espcn => "ESPCN",
            Self::Fsrcnn => "FSRCNN",
            Self::Lapsrn => "LapSRN",
            Self::RealEsrgan => "RealESRGAN",
        }
    }

    const fn key(self) -> &'static str {
        match self {
            Self::Edsr => "edsr",
            Self::Espcn => "espcn",
            Self::Fsrcnn => "fsrcnn",
            Self::Lapsrn => "lapsrn",
            Self::RealEsrgan => "realesrgan",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Architecture {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| ModelError::UnknownArchitecture(s.to_string()))
    }
}

/// Where a model lives and what it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Directory holding model files.
    pub dir: PathBuf,
    /// File name within `dir`.
    pub name: String,
    /// Network family, which fixes the tensor contract.
    pub architecture: Architecture,
    /// Upscale factor the model was trained for.
    pub scale: u32,
}

impl ModelSpec {
    /// Default model directory.
    pub const DEFAULT_DIR: &str = "models";

    /// Default network family.
    pub const DEFAULT_ARCHITECTURE: Architecture = Architecture::Edsr;

    /// Default upscale factor.
    pub const DEFAULT_SCALE: u32 = 4;

    /// A spec following the `<Family>_x<scale>.onnx` naming convention
    /// under [`DEFAULT_DIR`](Self::DEFAULT_DIR).
    #[must_use]
    pub fn for_architecture(architecture: Architecture, scale: u32) -> Self {
        Self {
            dir: PathBuf::from(Self::DEFAULT_DIR),
            name: format!("{}_x{scale}.onnx", architecture.display_name()),
            architecture,
            scale,
        }
    }

    /// Replace the model directory.
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Full path of the model file (which may not exist).
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    /// Check that the architecture supports the scale.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnsupportedScale`] otherwise.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.architecture.supported_scales().contains(&self.scale) {
            Ok(())
        } else {
            Err(ModelError::UnsupportedScale {
                architecture: self.architecture,
                scale: self.scale,
            })
        }
    }

    /// The model path, if the file exists.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if there is no file at
    /// [`path`](Self::path).
    pub fn resolve(&self) -> Result<PathBuf, ModelError> {
        let path = self.path();
        if path.is_file() {
            Ok(path)
        } else {
            Err(ModelError::NotFound(path))
        }
    }
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self::for_architecture(Self::DEFAULT_ARCHITECTURE, Self::DEFAULT_SCALE)
    }
}

/// Errors from locating or loading a model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// No model file at the resolved path.
    #[error("model file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The architecture has no model at this scale.
    #[error("{architecture} does not support scale {scale}")]
    UnsupportedScale {
        /// Requested architecture.
        architecture: Architecture,
        /// Requested scale.
        scale: u32,
    },

    /// Architecture name not recognized.
    #[error("unknown model architecture: {0}")]
    UnknownArchitecture(String),

    /// ONNX Runtime could not build a session from the file.
    #[error("failed to load model {}: {message}", path.display())]
    Session {
        /// The model file.
        path: PathBuf,
        /// ONNX Runtime's message.
        message: String,
    },
}

impl ModelError {
    /// The model path involved, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound(path) | Self::Session { path, .. } => Some(path),
            Self::UnsupportedScale { .. } | Self::UnknownArchitecture(_) => None,
        }
    }
}

impl From<ModelError> for UpscaleError {
    fn from(err: ModelError) -> Self {
        Self::ModelUnavailable(err.to_string())
    }
}
