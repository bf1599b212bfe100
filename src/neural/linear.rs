//! Linear model: a learned FIR filter
//!
//! `y[t] = bias + sum_d w[d] * x[t - d]`, with `w[0]` applied to the newest
//! sample.

use serde::Deserialize;

use super::tensor::WeightCursor;
use crate::engine::HistoryRing;
use crate::error::{RigError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct LinearConfig {
    pub receptive_field: usize,
    #[serde(default)]
    pub bias: bool,
}

/// Immutable parameters of a linear model
#[derive(Debug, Clone)]
pub struct LinearModel {
    weights: Vec<f32>,
    bias: f32,
}

impl LinearModel {
    pub fn build(config: &LinearConfig, cursor: &mut WeightCursor<'_>) -> Result<Self> {
        if config.receptive_field == 0 {
            return Err(RigError::load("model", "linear receptive field must be positive"));
        }
        let weights = cursor.take(config.receptive_field)?.to_vec();
        let bias = if config.bias { cursor.take_one()? } else { 0.0 };
        Ok(Self { weights, bias })
    }

    pub fn receptive_field(&self) -> usize {
        self.weights.len()
    }
}

/// Input history of a linear model
#[derive(Debug, Clone)]
pub struct LinearState {
    history: HistoryRing,
}

impl LinearState {
    pub fn new(model: &LinearModel) -> Self {
        Self {
            history: HistoryRing::new(1, model.receptive_field()),
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn render(&mut self, model: &LinearModel, input: &[f32], output: &mut [f32]) {
        for (x, y) in input.iter().zip(output.iter_mut()) {
            self.history.push(&[*x]);
            let mut acc = model.bias;
            for (delay, w) in model.weights.iter().enumerate() {
                acc += w * self.history.frame(delay)[0];
            }
            *y = acc;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn model(weights: &[f32], bias: bool) -> LinearModel {
        let rf = if bias { weights.len() - 1 } else { weights.len() };
        let config = LinearConfig {
            receptive_field: rf,
            bias,
        };
        let mut cursor = WeightCursor::new(weights);
        let model = LinearModel::build(&config, &mut cursor).unwrap();
        cursor.finish().unwrap();
        model
    }

    #[test]
    fn test_impulse_response_in_delay_order() {
        let model = model(&[1.0, 0.5, 0.25], false);
        let mut state = LinearState::new(&model);
        let mut out = [0.0; 5];
        state.render(&model, &[1.0, 0.0, 0.0, 0.0, 0.0], &mut out);
        assert_eq!(out, [1.0, 0.5, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_bias_is_added() {
        let model = model(&[2.0, 0.1], true);
        let mut state = LinearState::new(&model);
        let mut out = [0.0; 2];
        state.render(&model, &[0.0, 1.0], &mut out);
        assert_abs_diff_eq!(out[0], 0.1);
        assert_abs_diff_eq!(out[1], 2.1, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_receptive_field_rejected() {
        let config = LinearConfig {
            receptive_field: 0,
            bias: false,
        };
        assert!(LinearModel::build(&config, &mut WeightCursor::new(&[])).is_err());
    }
}
