//! ConvNet: a stack of dilated kernel-2 causal convolutions
//!
//! Each block is convolution, optional batch-norm (folded to a per-channel
//! affine at load time) and an activation. A linear head reduces the last
//! block's channels to one output sample.

use serde::Deserialize;

use super::activation::Activation;
use super::tensor::{DilatedConv, WeightCursor};
use crate::engine::HistoryRing;
use crate::error::{RigError, Result};

const KERNEL_SIZE: usize = 2;

#[derive(Debug, Clone, Deserialize)]
pub struct ConvNetConfig {
    pub channels: usize,
    pub dilations: Vec<usize>,
    #[serde(default)]
    pub batchnorm: bool,
    pub activation: String,
}

/// Batch-norm with running statistics folded into `scale * x + loc`
#[derive(Debug, Clone)]
struct FoldedBatchNorm {
    scale: Vec<f32>,
    loc: Vec<f32>,
}

impl FoldedBatchNorm {
    /// Reads running mean, running variance, weight, bias, then epsilon
    fn read(channels: usize, cursor: &mut WeightCursor<'_>) -> Result<Self> {
        let mean = cursor.take(channels)?;
        let var = cursor.take(channels)?;
        let weight = cursor.take(channels)?;
        let bias = cursor.take(channels)?;
        let eps = cursor.take_one()?;

        let scale: Vec<f32> = weight
            .iter()
            .zip(var)
            .map(|(w, v)| w / (eps + v).sqrt())
            .collect();
        let loc = bias
            .iter()
            .zip(mean)
            .zip(&scale)
            .map(|((b, m), s)| b - s * m)
            .collect();
        Ok(Self { scale, loc })
    }

    #[inline]
    fn apply(&self, values: &mut [f32]) {
        for ((v, s), l) in values.iter_mut().zip(&self.scale).zip(&self.loc) {
            *v = *v * s + l;
        }
    }
}

#[derive(Debug, Clone)]
struct ConvBlock {
    conv: DilatedConv,
    batchnorm: Option<FoldedBatchNorm>,
}

/// Immutable parameters of a ConvNet
#[derive(Debug, Clone)]
pub struct ConvNetModel {
    blocks: Vec<ConvBlock>,
    activation: Activation,
    head_weight: Vec<f32>,
    head_bias: f32,
    channels: usize,
}

impl ConvNetModel {
    pub fn build(config: &ConvNetConfig, cursor: &mut WeightCursor<'_>) -> Result<Self> {
        if config.channels == 0 || config.dilations.is_empty() {
            return Err(RigError::load(
                "model",
                "ConvNet needs at least one channel and one dilation",
            ));
        }
        let activation = Activation::from_name(&config.activation)?;

        let mut blocks = Vec::with_capacity(config.dilations.len());
        for (i, &dilation) in config.dilations.iter().enumerate() {
            let in_channels = if i == 0 { 1 } else { config.channels };
            let conv = DilatedConv::read(
                in_channels,
                config.channels,
                KERNEL_SIZE,
                dilation,
                !config.batchnorm,
                cursor,
            )?;
            let batchnorm = if config.batchnorm {
                Some(FoldedBatchNorm::read(config.channels, cursor)?)
            } else {
                None
            };
            blocks.push(ConvBlock { conv, batchnorm });
        }

        let head_weight = cursor.take(config.channels)?.to_vec();
        let head_bias = cursor.take_one()?;

        Ok(Self {
            blocks,
            activation,
            head_weight,
            head_bias,
            channels: config.channels,
        })
    }

    pub fn receptive_field(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, b| acc.saturating_add(b.conv.span() - 1))
    }

    /// History values one stream keeps across all blocks
    pub fn history_values(&self) -> usize {
        self.blocks
            .iter()
            .fold(0, |acc, b| acc.saturating_add(b.conv.history_len()))
    }
}

/// Per-block input histories of a ConvNet
#[derive(Debug, Clone)]
pub struct ConvNetState {
    histories: Vec<HistoryRing>,
    scratch: Vec<f32>,
}

impl ConvNetState {
    pub fn new(model: &ConvNetModel) -> Self {
        Self {
            histories: model.blocks.iter().map(|b| b.conv.history()).collect(),
            scratch: vec![0.0; model.channels],
        }
    }

    pub fn reset(&mut self) {
        self.histories.iter_mut().for_each(HistoryRing::clear);
        self.scratch.fill(0.0);
    }

    pub fn render(&mut self, model: &ConvNetModel, input: &[f32], output: &mut [f32]) {
        for (x, y) in input.iter().zip(output.iter_mut()) {
            *y = self.step(model, *x);
        }
    }

    #[inline]
    fn step(&mut self, model: &ConvNetModel, x: f32) -> f32 {
        self.histories[0].push(&[x]);
        let last = model.blocks.len() - 1;

        for (i, block) in model.blocks.iter().enumerate() {
            block.conv.apply(&self.histories[i], &mut self.scratch);
            if let Some(bn) = &block.batchnorm {
                bn.apply(&mut self.scratch);
            }
            model.activation.apply_slice(&mut self.scratch);
            if i < last {
                self.histories[i + 1].push(&self.scratch);
            }
        }

        model.head_bias
            + model
                .head_weight
                .iter()
                .zip(&self.scratch)
                .map(|(w, v)| w * v)
                .sum::<f32>()
    }
}
