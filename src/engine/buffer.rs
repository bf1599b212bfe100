//! Audio buffer and history storage
//!
//! `AudioBuffer` is the owned, mono sample container used around the core
//! (file I/O, IR loading, offline rendering). `HistoryRing` is the fixed
//! capacity frame store every stateful stage keeps its past in.

use crate::error::{RigError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default sample rate when nothing else is known (48kHz)
pub const DEFAULT_SAMPLE_RATE: f64 = 48000.0;

/// Supported processing rates (Hz), inclusive
pub const MIN_SAMPLE_RATE: f64 = 1000.0;
pub const MAX_SAMPLE_RATE: f64 = 768000.0;

/// Default processing block size
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Largest block size accepted as a hint
pub const MAX_BLOCK_SIZE: usize = 16384;

/// Silence floor used when reporting levels (-120dBFS)
pub const SILENCE_FLOOR_DB: f32 = -120.0;

// ============================================================================
// Helper Functions
// ============================================================================

/// Whether `rate` lies in the supported processing range
#[inline]
pub fn is_supported_rate(rate: f64) -> bool {
    (MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&rate)
}

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns `f32::NEG_INFINITY` for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

// ============================================================================
// AudioBuffer
// ============================================================================

/// Mono audio buffer with a known sample rate
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: f64,
}

impl AudioBuffer {
    /// Create a silent buffer of `num_samples` samples
    pub fn new(num_samples: usize, sample_rate: f64) -> Self {
        Self {
            samples: vec![0.0; num_samples],
            sample_rate,
        }
    }

    /// Wrap existing samples
    ///
    /// # Errors
    /// * `InvalidBuffer` - If the sample rate is not a positive finite number
    pub fn from_samples(samples: Vec<f32>, sample_rate: f64) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(RigError::invalid_buffer(format!(
                "sample rate must be positive, got {}",
                sample_rate
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }

    /// Get a reference to the samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Get a mutable reference to the samples
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Consume the buffer, returning its samples
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Check if buffer contains only finite samples
    pub fn is_valid(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }

    /// Peak level in dB
    pub fn peak_db(&self) -> f32 {
        let peak = self.samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max);
        linear_to_db(peak).max(SILENCE_FLOOR_DB)
    }

    /// RMS level in dB
    pub fn rms_db(&self) -> f32 {
        if self.samples.is_empty() {
            return SILENCE_FLOOR_DB;
        }
        let sum_sq: f64 = self.samples.iter().map(|&s| (s as f64).powi(2)).sum();
        let rms = (sum_sq / self.samples.len() as f64).sqrt() as f32;
        linear_to_db(rms).max(SILENCE_FLOOR_DB)
    }

    /// Scale every sample by a linear gain
    pub fn apply_gain(&mut self, gain: f32) {
        self.samples.iter_mut().for_each(|s| *s *= gain);
    }
}

// ============================================================================
// HistoryRing
// ============================================================================

/// Fixed-capacity ring of equally sized frames
///
/// Pushing a frame when the ring is full drops the oldest one. Frames are
/// addressed by delay: `frame(0)` is the most recent push, `frame(1)` the one
/// before it, and so on. Storage is allocated once; pushes never allocate.
#[derive(Clone, Debug)]
pub struct HistoryRing {
    data: Vec<f32>,
    width: usize,
    capacity: usize,
    head: usize,
}

impl HistoryRing {
    /// Create a zero-filled ring holding `capacity` frames of `width` values
    pub fn new(width: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: vec![0.0; width * capacity],
            width,
            capacity,
            head: 0,
        }
    }

    /// Values per frame
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of frames retained
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Zero every frame
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.head = 0;
    }

    /// Advance the ring and return the new newest frame for writing
    ///
    /// The returned slot still holds the oldest frame's values.
    #[inline]
    pub fn advance(&mut self) -> &mut [f32] {
        self.head = (self.head + 1) % self.capacity;
        let start = self.head * self.width;
        &mut self.data[start..start + self.width]
    }

    /// Push a frame, dropping the oldest
    #[inline]
    pub fn push(&mut self, frame: &[f32]) {
        debug_assert_eq!(frame.len(), self.width);
        self.advance().copy_from_slice(frame);
    }

    /// Frame `delay` steps in the past (0 = newest)
    ///
    /// Delays past the capacity wrap around; callers size the ring so that
    /// never happens.
    #[inline]
    pub fn frame(&self, delay: usize) -> &[f32] {
        debug_assert!(delay < self.capacity);
        let idx = (self.head + self.capacity - (delay % self.capacity)) % self.capacity;
        let start = idx * self.width;
        &self.data[start..start + self.width]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_new_buffer() {
        let buf = AudioBuffer::new(1000, 44100.0);
        assert_eq!(buf.len(), 1000);
        assert_eq!(buf.sample_rate(), 44100.0);
        assert!(buf.is_valid());
    }

    #[test]
    fn test_from_samples_rejects_bad_rate() {
        assert!(AudioBuffer::from_samples(vec![0.0; 4], 0.0).is_err());
        assert!(AudioBuffer::from_samples(vec![0.0; 4], f64::NAN).is_err());
    }

    #[test]
    fn test_rms_db_of_sine() {
        let samples: Vec<f32> = (0..48000)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 48000.0).sin())
            .collect();
        let buf = AudioBuffer::from_samples(samples, 48000.0).unwrap();
        // RMS of sine wave is 1/sqrt(2) = -3.01 dB
        assert_abs_diff_eq!(buf.rms_db(), -3.01, epsilon = 0.05);
        assert_abs_diff_eq!(buf.peak_db(), 0.0, epsilon = 0.01);
    }

    #[test]
    fn test_silence_levels_hit_floor() {
        let buf = AudioBuffer::new(64, 48000.0);
        assert_eq!(buf.peak_db(), SILENCE_FLOOR_DB);
        assert_eq!(buf.rms_db(), SILENCE_FLOOR_DB);
    }

    #[test]
    fn test_ring_drops_oldest() {
        let mut ring = HistoryRing::new(2, 3);
        ring.push(&[1.0, 10.0]);
        ring.push(&[2.0, 20.0]);
        ring.push(&[3.0, 30.0]);
        assert_eq!(ring.frame(0), &[3.0, 30.0]);
        assert_eq!(ring.frame(2), &[1.0, 10.0]);

        ring.push(&[4.0, 40.0]);
        assert_eq!(ring.frame(0), &[4.0, 40.0]);
        assert_eq!(ring.frame(1), &[3.0, 30.0]);
        assert_eq!(ring.frame(2), &[2.0, 20.0]);
    }

    #[test]
    fn test_ring_clear() {
        let mut ring = HistoryRing::new(1, 4);
        ring.push(&[5.0]);
        ring.clear();
        for delay in 0..4 {
            assert_eq!(ring.frame(delay), &[0.0]);
        }
    }

    #[test]
    fn test_db_round_trip() {
        assert_abs_diff_eq!(linear_to_db(db_to_linear(-18.0)), -18.0, epsilon = 1e-4);
        assert_eq!(linear_to_db(0.0), f32::NEG_INFINITY);
    }
}
