//! compressionx-io: Filesystem layer.
//!
//! Persists uploads into a temp workspace, runs the re-encoder and the
//! super-resolution engine file-to-file, and reports where each of the
//! three images ended up. All pixel work is delegated to
//! `compressionx-pipeline`; model loading to `compressionx-model`.

pub mod error;
pub mod files;
pub mod upload;
pub mod workspace;

pub use error::IoError;
pub use files::{Engine, UpscaleFileOutcome, compress_file, upscale_file};
pub use upload::{UploadResult, handle_upload};
pub use workspace::{UploadPaths, Workspace};
