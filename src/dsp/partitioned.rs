//! Uniformly partitioned FFT convolution (overlap-add, zero latency)
//!
//! The IR is cut into `block_size` partitions whose spectra are computed
//! once. Input is collected into a block; on every call the partially
//! filled block is transformed and multiplied with the first partition,
//! while the products of older input blocks with the later partitions are
//! summed once per block and reused. Output is available for every input
//! sample immediately, independent of how the stream is chunked.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::impulse::ImpulseResponse;

const ZERO: Complex<f32> = Complex { re: 0.0, im: 0.0 };

#[derive(Clone)]
pub struct PartitionedConvolver {
    block_size: usize,
    /// Spectra of the IR partitions
    ir_segments: Vec<Vec<Complex<f32>>>,
    /// Spectra of the most recent input blocks, indexed from `current`
    segments: Vec<Vec<Complex<f32>>>,
    current: usize,
    pre_multiplied: Vec<Complex<f32>>,
    conv: Vec<Complex<f32>>,
    fft_buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    overlap: Vec<f32>,
    input_buffer: Vec<f32>,
    input_fill: usize,
    fft_forward: Arc<dyn Fft<f32>>,
    fft_inverse: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for PartitionedConvolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionedConvolver")
            .field("block_size", &self.block_size)
            .field("partitions", &self.ir_segments.len())
            .field("input_fill", &self.input_fill)
            .finish()
    }
}

impl PartitionedConvolver {
    /// Plan partitions of `block_size` (rounded up to a power of two)
    pub fn new(ir: &ImpulseResponse, block_size: usize) -> Self {
        let block_size = block_size.max(1).next_power_of_two();
        let seg_size = 2 * block_size;
        let seg_count = ir.len().div_ceil(block_size);

        let mut planner = FftPlanner::<f32>::new();
        let fft_forward = planner.plan_fft_forward(seg_size);
        let fft_inverse = planner.plan_fft_inverse(seg_size);
        let scratch_len = fft_forward
            .get_inplace_scratch_len()
            .max(fft_inverse.get_inplace_scratch_len());
        let mut scratch = vec![ZERO; scratch_len];

        let ir_segments = ir
            .taps()
            .chunks(block_size)
            .map(|part| {
                let mut spectrum = vec![ZERO; seg_size];
                for (bin, &tap) in spectrum.iter_mut().zip(part) {
                    bin.re = tap;
                }
                fft_forward.process_with_scratch(&mut spectrum, &mut scratch);
                spectrum
            })
            .collect();

        Self {
            block_size,
            ir_segments,
            segments: vec![vec![ZERO; seg_size]; seg_count],
            current: 0,
            pre_multiplied: vec![ZERO; seg_size],
            conv: vec![ZERO; seg_size],
            fft_buffer: vec![ZERO; seg_size],
            scratch,
            overlap: vec![0.0; block_size],
            input_buffer: vec![0.0; block_size],
            input_fill: 0,
            fft_forward,
            fft_inverse,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn partitions(&self) -> usize {
        self.ir_segments.len()
    }

    /// Clear input history and overlap; IR spectra are kept
    pub fn reset(&mut self) {
        self.segments.iter_mut().for_each(|s| s.fill(ZERO));
        self.pre_multiplied.fill(ZERO);
        self.conv.fill(ZERO);
        self.fft_buffer.fill(ZERO);
        self.overlap.fill(0.0);
        self.input_buffer.fill(0.0);
        self.input_fill = 0;
        self.current = 0;
    }

    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let seg_count = self.segments.len();
        let seg_size = 2 * self.block_size;
        let norm = 1.0 / seg_size as f32;

        let mut processed = 0;
        while processed < output.len() {
            let block_was_empty = self.input_fill == 0;
            let pos = self.input_fill;
            let n = (output.len() - processed).min(self.block_size - pos);

            self.input_buffer[pos..pos + n].copy_from_slice(&input[processed..processed + n]);

            // forward FFT of the (partially filled) block, zero padded
            let segment = &mut self.segments[self.current];
            for (bin, &x) in segment.iter_mut().zip(&self.input_buffer) {
                *bin = Complex { re: x, im: 0.0 };
            }
            segment[self.block_size..].fill(ZERO);
            self.fft_forward
                .process_with_scratch(segment, &mut self.scratch);

            // older blocks only change once per block
            if block_was_empty {
                self.pre_multiplied.fill(ZERO);
                for i in 1..seg_count {
                    let audio = &self.segments[(self.current + i) % seg_count];
                    multiply_accumulate(&mut self.pre_multiplied, &self.ir_segments[i], audio);
                }
            }

            self.conv.copy_from_slice(&self.pre_multiplied);
            multiply_accumulate(
                &mut self.conv,
                &self.segments[self.current],
                &self.ir_segments[0],
            );

            self.fft_buffer.copy_from_slice(&self.conv);
            self.fft_inverse
                .process_with_scratch(&mut self.fft_buffer, &mut self.scratch);

            for i in 0..n {
                output[processed + i] = self.fft_buffer[pos + i].re * norm + self.overlap[pos + i];
            }

            self.input_fill += n;
            if self.input_fill == self.block_size {
                self.input_buffer.fill(0.0);
                self.input_fill = 0;

                for (o, bin) in self
                    .overlap
                    .iter_mut()
                    .zip(&self.fft_buffer[self.block_size..])
                {
                    *o = bin.re * norm;
                }

                self.current = if self.current > 0 {
                    self.current - 1
                } else {
                    seg_count - 1
                };
            }
            processed += n;
        }
    }
}

#[inline]
fn multiply_accumulate(result: &mut [Complex<f32>], a: &[Complex<f32>], b: &[Complex<f32>]) {
    for ((r, x), y) in result.iter_mut().zip(a).zip(b) {
        *r += x * y;
    }
}
