//! WaveNet: stacked arrays of dilated causal convolution layers
//!
//! Each layer array rechannels its input, runs it through residual layers
//! (dilated conv + input mixin from the raw input sample, activation or
//! gating, 1x1 residual) and accumulates every layer's activation into a
//! head signal. The head of one array seeds the head accumulator of the
//! next; the last array's head, times `head_scale`, is the output sample.

use serde::Deserialize;
use serde_json::Value;

use super::activation::{sigmoid, Activation};
use super::tensor::{checked_size, Conv1x1, DilatedConv, WeightCursor};
use crate::engine::HistoryRing;
use crate::error::{RigError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct LayerArrayConfig {
    pub input_size: usize,
    pub condition_size: usize,
    pub head_size: usize,
    pub channels: usize,
    pub kernel_size: usize,
    pub dilations: Vec<usize>,
    pub activation: String,
    #[serde(default)]
    pub gated: bool,
    #[serde(default)]
    pub head_bias: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaveNetConfig {
    pub layers: Vec<LayerArrayConfig>,
    #[serde(default)]
    pub head: Option<Value>,
    /// Informational; the effective scale is the last weight
    #[serde(default)]
    pub head_scale: Option<f32>,
}

#[derive(Debug, Clone)]
struct ResidualLayer {
    conv: DilatedConv,
    input_mixin: Conv1x1,
    conv_1x1: Conv1x1,
}

#[derive(Debug, Clone)]
struct LayerArray {
    rechannel: Conv1x1,
    layers: Vec<ResidualLayer>,
    head_rechannel: Conv1x1,
    channels: usize,
    activation: Activation,
    gated: bool,
}

/// Immutable parameters of a WaveNet model
#[derive(Debug, Clone)]
pub struct WaveNetModel {
    arrays: Vec<LayerArray>,
    head_scale: f32,
}

impl WaveNetModel {
    pub fn build(config: &WaveNetConfig, cursor: &mut WeightCursor<'_>) -> Result<Self> {
        validate_topology(config)?;

        let mut arrays = Vec::with_capacity(config.layers.len());
        for layer_cfg in &config.layers {
            let activation = Activation::from_name(&layer_cfg.activation)?;
            let z_channels = if layer_cfg.gated {
                checked_size(&[2, layer_cfg.channels])?
            } else {
                layer_cfg.channels
            };

            let rechannel = Conv1x1::read(layer_cfg.input_size, layer_cfg.channels, false, cursor)?;
            let mut layers = Vec::with_capacity(layer_cfg.dilations.len());
            for &dilation in &layer_cfg.dilations {
                let conv = DilatedConv::read(
                    layer_cfg.channels,
                    z_channels,
                    layer_cfg.kernel_size,
                    dilation,
                    true,
                    cursor,
                )?;
                let input_mixin = Conv1x1::read(layer_cfg.condition_size, z_channels, false, cursor)?;
                let conv_1x1 = Conv1x1::read(layer_cfg.channels, layer_cfg.channels, true, cursor)?;
                layers.push(ResidualLayer {
                    conv,
                    input_mixin,
                    conv_1x1,
                });
            }
            let head_rechannel =
                Conv1x1::read(layer_cfg.channels, layer_cfg.head_size, layer_cfg.head_bias, cursor)?;

            arrays.push(LayerArray {
                rechannel,
                layers,
                head_rechannel,
                channels: layer_cfg.channels,
                activation,
                gated: layer_cfg.gated,
            });
        }
        let head_scale = cursor.take_one()?;

        Ok(Self { arrays, head_scale })
    }

    pub fn receptive_field(&self) -> usize {
        self.layers()
            .fold(1, |acc, l| acc.saturating_add(l.conv.span() - 1))
    }

    /// History values one stream keeps across all layers
    pub fn history_values(&self) -> usize {
        self.layers()
            .fold(0, |acc, l| acc.saturating_add(l.conv.history_len()))
    }

    fn layers(&self) -> impl Iterator<Item = &ResidualLayer> {
        self.arrays.iter().flat_map(|a| a.layers.iter())
    }

    fn max_z_channels(&self) -> usize {
        self.layers()
            .map(|l| l.conv.out_channels())
            .max()
            .unwrap_or(0)
    }
}

fn validate_topology(config: &WaveNetConfig) -> Result<()> {
    let fail = |reason: String| Err(RigError::load("model", reason));

    if config.head.as_ref().is_some_and(|h| !h.is_null()) {
        return fail("WaveNet post-stack head is not supported".into());
    }
    let Some(first) = config.layers.first() else {
        return fail("WaveNet needs at least one layer array".into());
    };
    if first.input_size != 1 {
        return fail(format!("first layer array input size {} != 1", first.input_size));
    }

    for (i, layer_cfg) in config.layers.iter().enumerate() {
        if layer_cfg.condition_size != 1 {
            return fail(format!(
                "layer array {}: condition size {} is not supported",
                i, layer_cfg.condition_size
            ));
        }
        if layer_cfg.channels == 0 || layer_cfg.kernel_size == 0 || layer_cfg.dilations.is_empty() {
            return fail(format!("layer array {}: empty channels, kernel or dilations", i));
        }
        if let Some(next) = config.layers.get(i + 1) {
            if next.input_size != layer_cfg.channels {
                return fail(format!(
                    "layer array {} input size {} != previous channels {}",
                    i + 1,
                    next.input_size,
                    layer_cfg.channels
                ));
            }
            if layer_cfg.head_size != next.channels {
                return fail(format!(
                    "layer array {} head size {} != next channels {}",
                    i, layer_cfg.head_size, next.channels
                ));
            }
        } else if layer_cfg.head_size != 1 {
            return fail(format!("last head size {} != 1", layer_cfg.head_size));
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct ArrayState {
    /// Input history of every residual layer
    histories: Vec<HistoryRing>,
    head: Vec<f32>,
    head_out: Vec<f32>,
    output: Vec<f32>,
}

/// Layer histories and scratch of a WaveNet model
#[derive(Debug, Clone)]
pub struct WaveNetState {
    arrays: Vec<ArrayState>,
    z: Vec<f32>,
}

impl WaveNetState {
    pub fn new(model: &WaveNetModel) -> Self {
        let arrays = model
            .arrays
            .iter()
            .map(|a| ArrayState {
                histories: a.layers.iter().map(|l| l.conv.history()).collect(),
                head: vec![0.0; a.channels],
                head_out: vec![0.0; a.head_rechannel.out_channels()],
                output: vec![0.0; a.channels],
            })
            .collect();
        Self {
            arrays,
            z: vec![0.0; model.max_z_channels()],
        }
    }

    pub fn reset(&mut self) {
        for state in &mut self.arrays {
            state.histories.iter_mut().for_each(HistoryRing::clear);
            state.head.fill(0.0);
            state.head_out.fill(0.0);
            state.output.fill(0.0);
        }
        self.z.fill(0.0);
    }

    pub fn render(&mut self, model: &WaveNetModel, input: &[f32], output: &mut [f32]) {
        for (x, y) in input.iter().zip(output.iter_mut()) {
            *y = self.step(model, *x);
        }
    }

    fn step(&mut self, model: &WaveNetModel, x: f32) -> f32 {
        let condition = [x];

        for (a, array) in model.arrays.iter().enumerate() {
            let (done, rest) = self.arrays.split_at_mut(a);
            let state = &mut rest[0];
            let prev = done.last();

            let input: &[f32] = prev.map_or(&condition[..], |p| p.output.as_slice());
            array.rechannel.apply(input, state.histories[0].advance());
            match prev {
                Some(p) => state.head.copy_from_slice(&p.head_out),
                None => state.head.fill(0.0),
            }

            let channels = array.channels;
            let last = array.layers.len() - 1;
            for (l, layer) in array.layers.iter().enumerate() {
                let z = &mut self.z[..layer.conv.out_channels()];
                layer.conv.apply(&state.histories[l], z);
                layer.input_mixin.apply_add(&condition, z);

                if array.gated {
                    let (value, gate) = z.split_at_mut(channels);
                    array.activation.apply_slice(value);
                    for (v, g) in value.iter_mut().zip(gate.iter()) {
                        *v *= sigmoid(*g);
                    }
                } else {
                    array.activation.apply_slice(z);
                }
                let z = &z[..channels];

                for (h, v) in state.head.iter_mut().zip(z) {
                    *h += v;
                }

                // residual: next input = this input + 1x1(z)
                let (current, next) = state.histories.split_at_mut(l + 1);
                let dst: &mut [f32] = if l < last {
                    next[0].advance()
                } else {
                    &mut state.output[..]
                };
                layer.conv_1x1.apply(z, dst);
                for (d, r) in dst.iter_mut().zip(current[l].frame(0)) {
                    *d += r;
                }
            }

            array.head_rechannel.apply(&state.head, &mut state.head_out);
        }

        let top = &self.arrays[self.arrays.len() - 1];
        model.head_scale * top.head_out[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    fn single_layer_config(gated: bool) -> WaveNetConfig {
        serde_json::from_value(json!({
            "layers": [{
                "input_size": 1,
                "condition_size": 1,
                "head_size": 1,
                "channels": 1,
                "kernel_size": 2,
                "dilations": [1],
                "activation": "Hardtanh",
                "gated": gated,
                "head_bias": false
            }],
            "head": null,
            "head_scale": 2.0
        }))
        .unwrap()
    }

    #[test]
    fn test_single_layer_impulse() {
        // rechannel 1; conv taps [0.5, 1] bias 0; mixin 0; 1x1 w 1 b 0; head 1; scale 2
        let weights = [1.0, 0.5, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 2.0];
        let mut cursor = WeightCursor::new(&weights);
        let model = WaveNetModel::build(&single_layer_config(false), &mut cursor).unwrap();
        cursor.finish().unwrap();
        assert_eq!(model.receptive_field(), 2);

        let mut state = WaveNetState::new(&model);
        let mut out = [0.0; 3];
        state.render(&model, &[0.25, 0.0, 0.0], &mut out);
        assert_abs_diff_eq!(out[0], 0.5);
        assert_abs_diff_eq!(out[1], 0.25);
        assert_abs_diff_eq!(out[2], 0.0);
    }

    #[test]
    fn test_gated_layer_weight_count() {
        // gated doubles the conv and mixin outputs: 1 + (2*2 + 2) + 2 + (1 + 1) + 1 + 1
        let weights = vec![0.1; 13];
        let mut cursor = WeightCursor::new(&weights);
        WaveNetModel::build(&single_layer_config(true), &mut cursor).unwrap();
        cursor.finish().unwrap();
    }

    #[test]
    fn test_topology_mismatch_rejected() {
        let mut config = single_layer_config(false);
        config.layers[0].head_size = 2;
        let err = validate_topology(&config).unwrap_err();
        assert_eq!(err.error_code(), "LOAD_ERROR");
    }

    #[test]
    fn test_post_stack_head_rejected() {
        let mut config = single_layer_config(false);
        config.head = Some(json!({"num_layers": 1}));
        assert!(validate_topology(&config).is_err());
    }
}
