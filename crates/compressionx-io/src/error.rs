use std::path::PathBuf;

use compressionx_pipeline::PipelineError;

/// Errors from file-backed operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The input file does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The input file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// The file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An output file or directory could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// The file or directory.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The upload's extension is not an accepted image type.
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// The upload's name has no usable final component.
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    /// Decoding, encoding or configuration failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
