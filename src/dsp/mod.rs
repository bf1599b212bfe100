//! Linear processing stages
//!
//! Impulse responses, the convolution processor built on them, and the
//! pipeline that chains any stream processors together.

mod chain;
mod convolution;
mod direct;
mod impulse;
mod partitioned;

pub use chain::{ProcessingPipeline, Stage};
pub use convolution::{ConvolutionMethod, ConvolutionProcessor, DIRECT_MAX_TAPS};
pub use impulse::ImpulseResponse;
