//! Impulse response taps
//!
//! Immutable once built and shared through `Arc` between any number of
//! convolvers. Preparation (resampling, gain, truncation) produces a new
//! value rather than changing an existing one.

use crate::engine::buffer::AudioBuffer;
use crate::error::{RigError, Result};

/// Filter taps plus the sample rate they were captured or prepared at
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    taps: Vec<f32>,
    sample_rate: f64,
}

impl ImpulseResponse {
    /// Wrap taps at a sample rate
    ///
    /// # Errors
    /// * `Load` - If there are no taps, a tap is NaN/Inf or the rate is not
    ///   a positive finite number
    pub fn new(taps: Vec<f32>, sample_rate: f64) -> Result<Self> {
        if taps.is_empty() {
            return Err(RigError::load("impulse response", "no taps"));
        }
        if let Some(pos) = taps.iter().position(|t| !t.is_finite()) {
            return Err(RigError::load(
                "impulse response",
                format!("non-finite tap at index {}", pos),
            ));
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(RigError::load(
                "impulse response",
                format!("invalid sample rate {}", sample_rate),
            ));
        }
        Ok(Self { taps, sample_rate })
    }

    /// Build from a decoded audio buffer
    pub fn from_buffer(buffer: AudioBuffer) -> Result<Self> {
        let sample_rate = buffer.sample_rate();
        Self::new(buffer.into_samples(), sample_rate)
    }

    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.taps.len() as f64 / self.sample_rate
    }

    /// Resample to `target_rate` with Catmull-Rom cubic interpolation
    ///
    /// Returns a copy when the rates already match.
    pub fn resampled(&self, target_rate: f64) -> Result<Self> {
        if !(target_rate.is_finite() && target_rate > 0.0) {
            return Err(RigError::UnsupportedSampleRate {
                requested: target_rate,
                expected: self.sample_rate,
            });
        }
        if (target_rate - self.sample_rate).abs() < f64::EPSILON {
            return Ok(self.clone());
        }

        let step = self.sample_rate / target_rate;
        let out_len = (((self.taps.len() - 1) as f64 / step).floor() as usize) + 1;
        let at = |i: isize| -> f32 {
            if i < 0 || i as usize >= self.taps.len() {
                0.0
            } else {
                self.taps[i as usize]
            }
        };

        let taps = (0..out_len)
            .map(|n| {
                let pos = n as f64 * step;
                let idx = pos.floor() as isize;
                let t = (pos - idx as f64) as f32;
                catmull_rom(at(idx - 1), at(idx), at(idx + 1), at(idx + 2), t)
            })
            .collect();

        tracing::debug!(
            from = self.sample_rate,
            to = target_rate,
            taps = out_len,
            "resampled impulse response"
        );
        Self::new(taps, target_rate)
    }

    /// Multiply every tap by a linear gain
    pub fn scaled(&self, gain: f32) -> Self {
        Self {
            taps: self.taps.iter().map(|t| t * gain).collect(),
            sample_rate: self.sample_rate,
        }
    }

    /// Keep at most `max_taps` taps
    pub fn truncated(&self, max_taps: usize) -> Self {
        let keep = max_taps.max(1).min(self.taps.len());
        Self {
            taps: self.taps[..keep].to_vec(),
            sample_rate: self.sample_rate,
        }
    }
}

#[inline]
fn catmull_rom(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let a = -0.5 * p0 + 1.5 * p1 - 1.5 * p2 + 0.5 * p3;
    let b = p0 - 2.5 * p1 + 2.0 * p2 - 0.5 * p3;
    let c = -0.5 * p0 + 0.5 * p2;
    ((a * t + b) * t + c) * t + p1
}
