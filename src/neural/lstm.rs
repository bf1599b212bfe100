//! Stacked LSTM with a linear head
//!
//! Gate order in the packed weight matrix is input, forget, cell, output.
//! Initial hidden and cell vectors are trained parameters, so resetting the
//! state restores them rather than zeroing.

use serde::Deserialize;

use super::activation::sigmoid;
use super::tensor::{checked_size, Matrix, WeightCursor};
use crate::error::{RigError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct LstmConfig {
    pub num_layers: usize,
    pub input_size: usize,
    pub hidden_size: usize,
}

#[derive(Debug, Clone)]
struct LstmCell {
    /// (4H) x (I + H)
    weight: Matrix,
    bias: Vec<f32>,
    initial_hidden: Vec<f32>,
    initial_cell: Vec<f32>,
    input_size: usize,
}

impl LstmCell {
    fn read(input_size: usize, hidden_size: usize, cursor: &mut WeightCursor<'_>) -> Result<Self> {
        let gates = checked_size(&[4, hidden_size])?;
        let width = input_size
            .checked_add(hidden_size)
            .ok_or_else(|| RigError::load("model", "LSTM layer width overflows"))?;
        let weight = Matrix::read(gates, width, cursor)?;
        let bias = cursor.take(gates)?.to_vec();
        let initial_hidden = cursor.take(hidden_size)?.to_vec();
        let initial_cell = cursor.take(hidden_size)?.to_vec();
        Ok(Self {
            weight,
            bias,
            initial_hidden,
            initial_cell,
            input_size,
        })
    }

    fn hidden_size(&self) -> usize {
        self.initial_hidden.len()
    }
}

/// Immutable parameters of an LSTM model
#[derive(Debug, Clone)]
pub struct LstmModel {
    cells: Vec<LstmCell>,
    head_weight: Vec<f32>,
    head_bias: f32,
}

impl LstmModel {
    pub fn build(config: &LstmConfig, cursor: &mut WeightCursor<'_>) -> Result<Self> {
        if config.num_layers == 0 || config.hidden_size == 0 {
            return Err(RigError::load(
                "model",
                "LSTM needs at least one layer and a positive hidden size",
            ));
        }
        if config.input_size != 1 {
            return Err(RigError::load(
                "model",
                format!(
                    "LSTM input size {} is not supported (parametric models need 1)",
                    config.input_size
                ),
            ));
        }

        let mut cells = Vec::new();
        for layer in 0..config.num_layers {
            let input_size = if layer == 0 {
                config.input_size
            } else {
                config.hidden_size
            };
            cells.push(LstmCell::read(input_size, config.hidden_size, cursor)?);
        }
        let head_weight = cursor.take(config.hidden_size)?.to_vec();
        let head_bias = cursor.take_one()?;

        Ok(Self {
            cells,
            head_weight,
            head_bias,
        })
    }

    pub fn hidden_size(&self) -> usize {
        self.head_weight.len()
    }
}

#[derive(Debug, Clone)]
struct CellState {
    /// Concatenated [input, hidden]
    xh: Vec<f32>,
    cell: Vec<f32>,
}

/// Recurrent state of an LSTM model
#[derive(Debug, Clone)]
pub struct LstmState {
    layers: Vec<CellState>,
    gates: Vec<f32>,
}

impl LstmState {
    pub fn new(model: &LstmModel) -> Self {
        let layers = model
            .cells
            .iter()
            .map(|cell| CellState {
                xh: vec![0.0; cell.input_size + cell.hidden_size()],
                cell: vec![0.0; cell.hidden_size()],
            })
            .collect();
        let mut state = Self {
            layers,
            gates: vec![0.0; 4 * model.hidden_size()],
        };
        state.reset(model);
        state
    }

    /// Restore the trained initial hidden and cell vectors
    pub fn reset(&mut self, model: &LstmModel) {
        for (state, cell) in self.layers.iter_mut().zip(&model.cells) {
            state.xh[..cell.input_size].fill(0.0);
            state.xh[cell.input_size..].copy_from_slice(&cell.initial_hidden);
            state.cell.copy_from_slice(&cell.initial_cell);
        }
        self.gates.fill(0.0);
    }

    pub fn render(&mut self, model: &LstmModel, input: &[f32], output: &mut [f32]) {
        for (x, y) in input.iter().zip(output.iter_mut()) {
            *y = self.step(model, *x);
        }
    }

    #[inline]
    fn step(&mut self, model: &LstmModel, x: f32) -> f32 {
        let hidden = model.hidden_size();

        for layer in 0..self.layers.len() {
            let cell = &model.cells[layer];
            // feed the previous layer's fresh hidden state (or the sample) in
            let (done, rest) = self.layers.split_at_mut(layer);
            let state = &mut rest[0];
            match done.last() {
                Some(prev) => state.xh[..cell.input_size]
                    .copy_from_slice(&prev.xh[prev.xh.len() - hidden..]),
                None => state.xh[0] = x,
            }

            self.gates.copy_from_slice(&cell.bias);
            cell.weight.mul_add(&state.xh, &mut self.gates);

            let (i_gate, tail) = self.gates.split_at(hidden);
            let (f_gate, tail) = tail.split_at(hidden);
            let (g_gate, o_gate) = tail.split_at(hidden);
            let h = &mut state.xh[cell.input_size..];
            for j in 0..hidden {
                let c = sigmoid(f_gate[j]) * state.cell[j] + sigmoid(i_gate[j]) * g_gate[j].tanh();
                state.cell[j] = c;
                h[j] = sigmoid(o_gate[j]) * c.tanh();
            }
        }

        let top = &self.layers[self.layers.len() - 1].xh;
        model.head_bias
            + model
                .head_weight
                .iter()
                .zip(&top[top.len() - hidden..])
                .map(|(w, h)| w * h)
                .sum::<f32>()
    }
}
