//! Tone model inference
//!
//! This module provides:
//! - `ModelDescriptor`, the plain-data view of a model file
//! - `Model`, the immutable network built from it (Linear, ConvNet, LSTM, WaveNet)
//! - `ModelState`, the per-stream history
//! - `ToneModel`, the streaming processor tying them together

mod activation;
mod convnet;
mod descriptor;
mod linear;
mod lstm;
mod model;
mod tensor;
mod tone;
mod wavenet;

pub use activation::Activation;
pub use descriptor::{Architecture, ModelDescriptor, ModelMetadata, SUPPORTED_MINOR_VERSION};
pub use model::{Model, ModelInfo, ModelState, Network};
pub use tone::{ToneModel, TARGET_LOUDNESS_DB};
