//! Tone model processor
//!
//! Wraps a shared [`Model`] with the per-stream [`ModelState`] and implements
//! the streaming contract. Models are sample-rate specific: a model that
//! declares the rate it was trained at refuses any other rate.

use std::sync::Arc;

use super::descriptor::ModelDescriptor;
use super::model::{Model, ModelInfo, ModelState};
use crate::engine::buffer::{db_to_linear, DEFAULT_BLOCK_SIZE, DEFAULT_SAMPLE_RATE};
use crate::engine::processor::{clamp_block_size, validate_sample_rate, StreamProcessor};
use crate::error::{RigError, Result};

/// Loudness that normalised models are scaled to (dB)
pub const TARGET_LOUDNESS_DB: f64 = -18.0;

/// Largest rate difference (Hz) still treated as the declared rate
const RATE_TOLERANCE_HZ: f64 = 0.5;

/// Silent block used while prewarming
const PREWARM_CHUNK: usize = 64;

/// Streaming processor running a tone model
#[derive(Debug, Clone)]
pub struct ToneModel {
    model: Arc<Model>,
    state: ModelState,
    sample_rate: f64,
    block_size: usize,
    normalize_output: bool,
    output_gain: f32,
}

impl ToneModel {
    /// Create a processor for an already built model
    ///
    /// The processor starts at the model's declared sample rate (or 48kHz
    /// when none is declared) with zeroed history.
    pub fn new(model: Arc<Model>) -> Self {
        let state = ModelState::new(&model);
        let sample_rate = model
            .info()
            .expected_sample_rate
            .unwrap_or(DEFAULT_SAMPLE_RATE);
        tracing::info!(
            architecture = model.architecture().name(),
            receptive_field = model.receptive_field(),
            "tone model ready"
        );
        Self {
            model,
            state,
            sample_rate,
            block_size: DEFAULT_BLOCK_SIZE,
            normalize_output: false,
            output_gain: 1.0,
        }
    }

    /// Build a model from a descriptor and wrap it
    pub fn from_descriptor(desc: &ModelDescriptor) -> Result<Self> {
        Ok(Self::new(Arc::new(Model::from_descriptor(desc)?)))
    }

    /// Shared handle to the immutable model, for building more streams
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn info(&self) -> &ModelInfo {
        self.model.info()
    }

    pub fn receptive_field(&self) -> usize {
        self.model.receptive_field()
    }

    /// Silent samples `prewarm` runs at the current rate
    pub fn prewarm_samples(&self) -> usize {
        self.model.prewarm_samples(self.sample_rate)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Scale output so the model plays back at [`TARGET_LOUDNESS_DB`]
    ///
    /// Has no effect on models without recorded loudness.
    pub fn set_output_normalization(&mut self, enabled: bool) {
        self.normalize_output = enabled;
        self.output_gain = match (enabled, self.model.info().loudness()) {
            (true, Some(loudness)) => db_to_linear((TARGET_LOUDNESS_DB - loudness) as f32),
            (true, None) => {
                tracing::warn!("model has no loudness metadata; output left unnormalized");
                1.0
            }
            (false, _) => 1.0,
        };
    }

    pub fn output_normalization(&self) -> bool {
        self.normalize_output
    }

    /// Linear gain currently applied to the model output
    pub fn output_gain(&self) -> f32 {
        self.output_gain
    }
}

impl StreamProcessor for ToneModel {
    /// Check a rate against the model's declared rate
    fn check_sample_rate(&self, sample_rate: f64) -> Result<()> {
        validate_sample_rate(sample_rate, self.sample_rate)?;
        match self.model.info().expected_sample_rate {
            Some(expected) if (expected - sample_rate).abs() > RATE_TOLERANCE_HZ => {
                Err(RigError::UnsupportedSampleRate {
                    requested: sample_rate,
                    expected,
                })
            }
            Some(_) => Ok(()),
            None => {
                if (sample_rate - DEFAULT_SAMPLE_RATE).abs() > RATE_TOLERANCE_HZ {
                    tracing::warn!(
                        sample_rate,
                        "model declares no sample rate; assuming it matches"
                    );
                }
                Ok(())
            }
        }
    }

    fn render(&mut self, input: &[f32], output: &mut [f32]) {
        self.state.render(&self.model, input, output);
        if self.output_gain != 1.0 {
            output.iter_mut().for_each(|y| *y *= self.output_gain);
        }
    }

    fn reset(&mut self, sample_rate: f64, block_size_hint: usize) -> Result<()> {
        self.check_sample_rate(sample_rate)?;
        self.sample_rate = sample_rate;
        self.block_size = clamp_block_size(block_size_hint);
        self.state.reset(&self.model);
        tracing::debug!(sample_rate, block_size = self.block_size, "tone model reset");
        Ok(())
    }

    /// Reset to the initial state, then run silence through the model
    ///
    /// Always starts from the initial state, so repeated calls end in the
    /// same state.
    fn prewarm(&mut self) {
        self.state.reset(&self.model);
        let silence = [0.0_f32; PREWARM_CHUNK];
        let mut discard = [0.0_f32; PREWARM_CHUNK];
        let total = self.prewarm_samples();
        let mut remaining = total;
        while remaining > 0 {
            let n = remaining.min(PREWARM_CHUNK);
            self.state.render(&self.model, &silence[..n], &mut discard[..n]);
            remaining -= n;
        }
        tracing::debug!(samples = total, "tone model prewarmed");
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn kind(&self) -> &'static str {
        "tone_model"
    }
}
