//! Streaming convolution against an impulse response
//!
//! Short IRs run as a direct-form FIR; longer ones through a uniformly
//! partitioned FFT convolver. Both are zero latency and produce the same
//! output regardless of how the stream is split into blocks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::direct::DirectConvolver;
use super::impulse::ImpulseResponse;
use super::partitioned::PartitionedConvolver;
use crate::engine::buffer::DEFAULT_BLOCK_SIZE;
use crate::engine::processor::{clamp_block_size, validate_sample_rate, StreamProcessor};
use crate::error::{RigError, Result};

/// IRs up to this many taps use direct convolution in `Auto` mode
pub const DIRECT_MAX_TAPS: usize = 64;

/// Partition size bounds for the FFT path
const MIN_PARTITION: usize = 64;
const MAX_PARTITION: usize = 4096;

/// Convolution strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvolutionMethod {
    /// Pick by IR length
    #[default]
    Auto,
    Direct,
    Partitioned,
}

impl ConvolutionMethod {
    fn resolve(self, taps: usize) -> Self {
        match self {
            ConvolutionMethod::Auto if taps <= DIRECT_MAX_TAPS => ConvolutionMethod::Direct,
            ConvolutionMethod::Auto => ConvolutionMethod::Partitioned,
            other => other,
        }
    }
}

#[derive(Debug, Clone)]
enum Engine {
    Direct(DirectConvolver),
    Partitioned(PartitionedConvolver),
}

impl Engine {
    fn build(ir: &ImpulseResponse, method: ConvolutionMethod, block_size: usize) -> Self {
        match method.resolve(ir.len()) {
            ConvolutionMethod::Direct => Engine::Direct(DirectConvolver::new(ir)),
            _ => Engine::Partitioned(PartitionedConvolver::new(ir, partition_size(block_size))),
        }
    }
}

fn partition_size(block_size: usize) -> usize {
    block_size
        .next_power_of_two()
        .clamp(MIN_PARTITION, MAX_PARTITION)
}

/// Streaming convolution processor
///
/// The IR is shared; each processor owns its own delay line or input spectra.
#[derive(Debug, Clone)]
pub struct ConvolutionProcessor {
    ir: Arc<ImpulseResponse>,
    engine: Engine,
    method: ConvolutionMethod,
    sample_rate: f64,
    block_size: usize,
}

impl ConvolutionProcessor {
    /// Create a processor running at `sample_rate`
    ///
    /// # Errors
    /// * `UnsupportedSampleRate` - If the IR was prepared for another rate
    pub fn new(ir: Arc<ImpulseResponse>, sample_rate: f64) -> Result<Self> {
        Self::with_method(ir, sample_rate, ConvolutionMethod::Auto)
    }

    /// Create a processor with an explicit convolution strategy
    pub fn with_method(
        ir: Arc<ImpulseResponse>,
        sample_rate: f64,
        method: ConvolutionMethod,
    ) -> Result<Self> {
        check_rate(&ir, sample_rate)?;
        let engine = Engine::build(&ir, method, DEFAULT_BLOCK_SIZE);
        tracing::info!(
            taps = ir.len(),
            method = ?method.resolve(ir.len()),
            sample_rate,
            "convolution ready"
        );
        Ok(Self {
            ir,
            engine,
            method,
            sample_rate,
            block_size: DEFAULT_BLOCK_SIZE,
        })
    }

    pub fn impulse_response(&self) -> &Arc<ImpulseResponse> {
        &self.ir
    }

    pub fn tap_count(&self) -> usize {
        self.ir.len()
    }

    /// Strategy actually in use after resolving `Auto`
    pub fn resolved_method(&self) -> ConvolutionMethod {
        match self.engine {
            Engine::Direct(_) => ConvolutionMethod::Direct,
            Engine::Partitioned(_) => ConvolutionMethod::Partitioned,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

fn check_rate(ir: &ImpulseResponse, sample_rate: f64) -> Result<()> {
    validate_sample_rate(sample_rate, ir.sample_rate())?;
    if (ir.sample_rate() - sample_rate).abs() > 0.5 {
        return Err(RigError::UnsupportedSampleRate {
            requested: sample_rate,
            expected: ir.sample_rate(),
        });
    }
    Ok(())
}

impl StreamProcessor for ConvolutionProcessor {
    fn render(&mut self, input: &[f32], output: &mut [f32]) {
        match &mut self.engine {
            Engine::Direct(conv) => conv.process(input, output),
            Engine::Partitioned(conv) => conv.process(input, output),
        }
    }

    fn check_sample_rate(&self, sample_rate: f64) -> Result<()> {
        check_rate(&self.ir, sample_rate)
    }

    fn reset(&mut self, sample_rate: f64, block_size_hint: usize) -> Result<()> {
        check_rate(&self.ir, sample_rate)?;
        self.sample_rate = sample_rate;
        self.block_size = clamp_block_size(block_size_hint);

        let replan = matches!(
            &self.engine,
            Engine::Partitioned(conv) if conv.block_size() != partition_size(self.block_size)
        );
        if replan {
            self.engine = Engine::build(&self.ir, self.method, self.block_size);
        } else {
            self.prewarm();
        }
        tracing::debug!(sample_rate, block_size = self.block_size, "convolution reset");
        Ok(())
    }

    /// Clear the delay line; silence in yields silence out afterwards
    fn prewarm(&mut self) {
        match &mut self.engine {
            Engine::Direct(conv) => conv.reset(),
            Engine::Partitioned(conv) => conv.reset(),
        }
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn kind(&self) -> &'static str {
        "convolution"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    fn ir(taps: Vec<f32>) -> Arc<ImpulseResponse> {
        Arc::new(ImpulseResponse::new(taps, 48000.0).unwrap())
    }

    fn long_ir() -> Arc<ImpulseResponse> {
        ir((0..700)
            .map(|i| (-(i as f32) / 120.0).exp() * ((i * 13) % 7) as f32 / 7.0)
            .collect())
    }

    fn signal(len: usize) -> Vec<f32> {
        (0..len).map(|i| ((i as f32) * 0.37).sin() * 0.5).collect()
    }

    #[test_case(ConvolutionMethod::Direct ; "direct")]
    #[test_case(ConvolutionMethod::Partitioned ; "partitioned")]
    fn test_three_tap_impulse(method: ConvolutionMethod) {
        let mut conv =
            ConvolutionProcessor::with_method(ir(vec![1.0, 0.5, 0.25]), 48000.0, method).unwrap();
        let out = conv.process_to_vec(&[1.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        let expected = [1.0, 0.5, 0.25, 0.0, 0.0];
        for (got, want) in out.iter().zip(expected) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_auto_resolves_by_length() {
        let short = ConvolutionProcessor::new(ir(vec![1.0; 16]), 48000.0).unwrap();
        assert_eq!(short.resolved_method(), ConvolutionMethod::Direct);
        let long = ConvolutionProcessor::new(long_ir(), 48000.0).unwrap();
        assert_eq!(long.resolved_method(), ConvolutionMethod::Partitioned);
    }

    #[test]
    fn test_rejects_rate_mismatch() {
        let err = ConvolutionProcessor::new(ir(vec![1.0]), 44100.0).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_SAMPLE_RATE");

        let mut conv = ConvolutionProcessor::new(ir(vec![1.0]), 48000.0).unwrap();
        assert!(conv.reset(96000.0, 256).is_err());
        assert_eq!(conv.sample_rate(), 48000.0);
    }

    #[test]
    fn test_direct_and_partitioned_agree() {
        let input = signal(2000);
        let mut direct =
            ConvolutionProcessor::with_method(long_ir(), 48000.0, ConvolutionMethod::Direct)
                .unwrap();
        let mut fft =
            ConvolutionProcessor::with_method(long_ir(), 48000.0, ConvolutionMethod::Partitioned)
                .unwrap();

        let a = direct.process_to_vec(&input).unwrap();
        let b = fft.process_to_vec(&input).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-3);
        }
    }

    #[test_case(1 ; "single samples")]
    #[test_case(63 ; "odd blocks")]
    #[test_case(512 ; "partition sized")]
    #[test_case(1500 ; "larger than partition")]
    fn test_chunking_invariance(chunk: usize) {
        let input = signal(3000);
        let mut whole = ConvolutionProcessor::new(long_ir(), 48000.0).unwrap();
        let reference = whole.process_to_vec(&input).unwrap();

        let mut chunked = ConvolutionProcessor::new(long_ir(), 48000.0).unwrap();
        let mut out = vec![0.0; input.len()];
        for (inp, o) in input.chunks(chunk).zip(out.chunks_mut(chunk)) {
            chunked.process(inp, o).unwrap();
        }
        for (x, y) in reference.iter().zip(&out) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_reset_replans_partitions() {
        let mut conv = ConvolutionProcessor::new(long_ir(), 48000.0).unwrap();
        conv.reset(48000.0, 128).unwrap();
        assert_eq!(conv.block_size(), 128);

        let input = signal(600);
        let a = conv.process_to_vec(&input).unwrap();
        conv.reset(48000.0, 1024).unwrap();
        let b = conv.process_to_vec(&input).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_silence_after_prewarm() {
        let mut conv = ConvolutionProcessor::new(long_ir(), 48000.0).unwrap();
        conv.process_to_vec(&signal(300)).unwrap();
        conv.prewarm();
        let out = conv.process_to_vec(&[0.0; 256]).unwrap();
        assert!(out.iter().all(|y| y.abs() < 1e-6));
    }
}
