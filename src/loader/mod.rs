//! Model and impulse-response loading
//!
//! Turns files, in-memory bytes or already parsed values into validated
//! immutable `Model` / `ImpulseResponse` values. Every failure surfaces as
//! `RigError::Load` naming the source.

mod ir;
mod nam;

pub use ir::{load_impulse_response, IrLoadOptions, IrSource, IR_REFERENCE_RATE};
pub use nam::{load_model, read_descriptor, ModelSource, MODEL_EXTENSION};
