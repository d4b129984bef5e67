//! compressionx-model: neural super-resolution engines.
//!
//! Implements [`compressionx_pipeline::SuperResolution`] on top of ONNX
//! Runtime. A [`ModelSpec`] names the model file and its
//! [`Architecture`], which fixes the tensor contract (channel layout and
//! value range). Model weights are not bundled; they are read from
//! `models/` by default.

pub mod onnx;
pub mod tensor;
pub mod types;

pub use onnx::OnnxSuperResolution;
pub use types::{Architecture, Channels, ModelError, ModelSpec};
