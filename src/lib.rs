//! namrig - real-time neural amp model and cabinet IR processing
//!
//! namrig runs trained tone models (the `.nam` format) and impulse-response
//! convolution as streaming processors that can be chained into a rig.
//!
//! # Architecture
//!
//! - `engine`: buffers, the `StreamProcessor` contract and WAV I/O
//! - `neural`: model descriptors, the four network families and `ToneModel`
//! - `dsp`: impulse responses, `ConvolutionProcessor` and `ProcessingPipeline`
//! - `loader`: `.nam` and WAV loading into validated immutable values
//! - `config`: JSON rig files
//!
//! Immutable models and impulse responses are shared through `Arc`; every
//! processor owns its own per-stream state, so one model can drive several
//! channels at once.

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod loader;
pub mod neural;

pub use config::{ConvolutionSettings, EngineSettings, RigConfig};
pub use dsp::{ConvolutionMethod, ConvolutionProcessor, ImpulseResponse, ProcessingPipeline};
pub use engine::{AudioBuffer, StreamProcessor};
pub use error::{Result, RigError};
pub use loader::{load_impulse_response, load_model, IrLoadOptions, IrSource, ModelSource};
pub use neural::{Architecture, Model, ModelDescriptor, ModelInfo, ToneModel};
