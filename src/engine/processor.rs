//! Streaming processor contract
//!
//! Every stage consumes N samples and produces N samples, carrying its state
//! from one call to the next. Buffers are validated before any state is
//! touched, so a rejected call leaves the processor exactly as it was.

use crate::engine::buffer::{is_supported_rate, MAX_BLOCK_SIZE};
use crate::error::{RigError, Result};

/// Common contract for tone models, convolvers and pipelines
pub trait StreamProcessor: Send {
    /// Process one block
    ///
    /// `input` and `output` must have the same length. A zero-length block is
    /// a no-op.
    ///
    /// # Errors
    /// * `InvalidBuffer` - If the lengths differ or the input holds NaN/Inf.
    ///   Internal state is untouched in that case.
    fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<()> {
        validate_block(input, output)?;
        if !input.is_empty() {
            self.render(input, output);
        }
        Ok(())
    }

    /// Process one block into a freshly allocated output
    ///
    /// Convenience for hosts; not for use on the audio thread.
    fn process_to_vec(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let mut output = vec![0.0; input.len()];
        self.process(input, &mut output)?;
        Ok(output)
    }

    /// Process an already validated block
    ///
    /// Never allocates and never fails. Blocks of any length are accepted.
    fn render(&mut self, input: &[f32], output: &mut [f32]);

    /// Reinitialize all state for a (possibly new) sample rate and block size
    ///
    /// On error the processor is left unchanged.
    fn reset(&mut self, sample_rate: f64, block_size_hint: usize) -> Result<()>;

    /// Check whether `reset` would accept a sample rate, without changing
    /// anything
    fn check_sample_rate(&self, sample_rate: f64) -> Result<()> {
        validate_sample_rate(sample_rate, self.sample_rate())
    }

    /// Bring internal state to its steady state for silent input
    fn prewarm(&mut self);

    /// Sample rate the processor is currently prepared for
    fn sample_rate(&self) -> f64;

    /// Short identifier of the processor family
    fn kind(&self) -> &'static str;
}

/// Check that a block pair is well formed
pub fn validate_block(input: &[f32], output: &[f32]) -> Result<()> {
    if input.len() != output.len() {
        return Err(RigError::invalid_buffer(format!(
            "input has {} samples but output has {}",
            input.len(),
            output.len()
        )));
    }
    if let Some(pos) = input.iter().position(|s| !s.is_finite()) {
        return Err(RigError::invalid_buffer(format!(
            "non-finite input sample at index {}",
            pos
        )));
    }
    Ok(())
}

/// Check that a requested sample rate is usable at all
///
/// Rates outside `MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE` are rejected.
pub fn validate_sample_rate(requested: f64, current: f64) -> Result<()> {
    if is_supported_rate(requested) {
        Ok(())
    } else {
        Err(RigError::UnsupportedSampleRate {
            requested,
            expected: current,
        })
    }
}

/// Clamp a block-size hint into the supported range
pub fn clamp_block_size(hint: usize) -> usize {
    hint.clamp(1, MAX_BLOCK_SIZE)
}

/// Run `f` over consecutive sub-blocks of at most `max_len` samples
///
/// Lets stages with block-sized scratch storage accept arbitrarily long
/// blocks without allocating.
#[inline]
pub fn for_each_sub_block<F>(input: &[f32], output: &mut [f32], max_len: usize, mut f: F)
where
    F: FnMut(&[f32], &mut [f32]),
{
    let max_len = max_len.max(1);
    for (inp, out) in input.chunks(max_len).zip(output.chunks_mut(max_len)) {
        f(inp, out);
    }
}
