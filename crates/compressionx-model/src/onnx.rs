//! ONNX Runtime engine.

use std::path::{Path, PathBuf};

use compressionx_pipeline::{RgbImage, SuperResolution, UpscaleError};
use ndarray::{Array4, Ix4};
use ort::session::Session;
use ort::value::Tensor;

use crate::tensor;
use crate::types::{Architecture, Channels, ModelError, ModelSpec};

/// A super-resolution network running in an ONNX Runtime session.
pub struct OnnxSuperResolution {
    session: Session,
    architecture: Architecture,
    scale: u32,
    path: PathBuf,
}

impl OnnxSuperResolution {
    /// Validate `spec`, find its file and build a session from it.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnsupportedScale`] for a scale the
    /// architecture has no model for, [`ModelError::NotFound`] if the file
    /// is missing, and [`ModelError::Session`] if ONNX Runtime rejects it.
    pub fn load(spec: &ModelSpec) -> Result<Self, ModelError> {
        spec.validate()?;
        let path = spec.resolve()?;
        let session = Session::builder()
            .and_then(|b| b.commit_from_file(&path))
            .map_err(|e| ModelError::Session {
                path: path.clone(),
                message: e.to_string(),
            })?;
        tracing::info!(
            path = %path.display(),
            architecture = %spec.architecture,
            scale = spec.scale,
            "loaded super-resolution model"
        );
        Ok(Self {
            session,
            architecture: spec.architecture,
            scale: spec.scale,
            path,
        })
    }

    /// The model file this session was built from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The network family.
    #[must_use]
    pub const fn architecture(&self) -> Architecture {
        self.architecture
    }

    fn infer(&mut self, input: Array4<f32>) -> Result<Array4<f32>, UpscaleError> {
        let input_tensor = Tensor::from_array(input).map_err(inference)?;
        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(inference)?;
        let out_view = outputs[0].try_extract_array::<f32>().map_err(inference)?;
        let out4 = out_view
            .into_dimensionality::<Ix4>()
            .map_err(|e| UpscaleError::Inference(e.to_string()))?;
        Ok(out4.to_owned())
    }
}

fn inference(err: ort::Error) -> UpscaleError {
    UpscaleError::Inference(err.to_string())
}

impl SuperResolution for OnnxSuperResolution {
    fn name(&self) -> &str {
        self.architecture.display_name()
    }

    fn scale(&self) -> u32 {
        self.scale
    }

    fn upsample(&mut self, input: &RgbImage) -> Result<RgbImage, UpscaleError> {
        let range = self.architecture.input_range();
        tracing::debug!(
            width = input.width(),
            height = input.height(),
            model = %self.path.display(),
            "running super-resolution"
        );
        match self.architecture.channels() {
            Channels::Rgb => {
                let out = self.infer(tensor::rgb_to_nchw(input, range))?;
                tensor::nchw_to_rgb(out.view(), range)
            }
            Channels::Luma => {
                let out = self.infer(tensor::luma_to_nchw(input, range))?;
                tensor::merge_luma(out.view(), range, input)
            }
        }
    }
}
