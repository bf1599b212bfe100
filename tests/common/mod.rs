//! Shared fixtures for integration tests
//!
//! Builds small but complete model descriptors of every architecture with
//! deterministic pseudo-random weights.

#![allow(dead_code)]

use namrig::{Architecture, ModelDescriptor};
use serde_json::{json, Value};

pub const SAMPLE_RATE: f64 = 48000.0;

/// Deterministic weights in `[-scale, scale]`
pub fn weights(count: usize, seed: u64, scale: f32) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
            (unit * 2.0 - 1.0) * scale
        })
        .collect()
}

/// Test signal: a decaying chirp with some noise-like content
pub fn signal(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            let chirp = (2.0 * std::f32::consts::PI * (110.0 + 2000.0 * t) * t).sin();
            let grit = ((i * 7919) % 97) as f32 / 97.0 - 0.5;
            0.4 * chirp + 0.1 * grit
        })
        .collect()
}

pub fn linear() -> ModelDescriptor {
    let receptive_field = 32;
    ModelDescriptor::new(
        Architecture::Linear,
        json!({"receptive_field": receptive_field, "bias": true}),
        weights(receptive_field + 1, 1, 0.2),
    )
    .with_sample_rate(SAMPLE_RATE)
}

pub fn convnet() -> ModelDescriptor {
    let channels = 4;
    let dilations = [1, 2, 4, 8];
    let mut count = 0;
    for i in 0..dilations.len() {
        let in_channels = if i == 0 { 1 } else { channels };
        count += in_channels * channels * 2 + channels;
    }
    count += channels + 1;

    ModelDescriptor::new(
        Architecture::ConvNet,
        json!({
            "channels": channels,
            "dilations": dilations,
            "batchnorm": false,
            "activation": "Tanh"
        }),
        weights(count, 2, 0.6),
    )
    .with_sample_rate(SAMPLE_RATE)
}

pub fn lstm() -> ModelDescriptor {
    let layers = 2;
    let hidden = 4;
    let mut count = 0;
    for layer in 0..layers {
        let input = if layer == 0 { 1 } else { hidden };
        count += 4 * hidden * (input + hidden) + 4 * hidden + 2 * hidden;
    }
    count += hidden + 1;

    ModelDescriptor::new(
        Architecture::Lstm,
        json!({"num_layers": layers, "input_size": 1, "hidden_size": hidden}),
        weights(count, 3, 0.5),
    )
    .with_sample_rate(SAMPLE_RATE)
}

struct ArraySpec {
    input_size: usize,
    head_size: usize,
    channels: usize,
    kernel_size: usize,
    dilations: Vec<usize>,
    gated: bool,
    head_bias: bool,
}

impl ArraySpec {
    fn weight_count(&self) -> usize {
        let c = self.channels;
        let z = if self.gated { 2 * c } else { c };
        let per_layer = c * z * self.kernel_size + z + z + c * c + c;
        let head = c * self.head_size + if self.head_bias { self.head_size } else { 0 };
        self.input_size * c + self.dilations.len() * per_layer + head
    }

    fn to_json(&self) -> Value {
        json!({
            "input_size": self.input_size,
            "condition_size": 1,
            "head_size": self.head_size,
            "channels": self.channels,
            "kernel_size": self.kernel_size,
            "dilations": self.dilations,
            "activation": "Tanh",
            "gated": self.gated,
            "head_bias": self.head_bias
        })
    }
}

/// Two layer arrays, the second one gated, in the shape of a standard
/// WaveNet capture scaled down
pub fn wavenet() -> ModelDescriptor {
    let arrays = [
        ArraySpec {
            input_size: 1,
            head_size: 2,
            channels: 4,
            kernel_size: 3,
            dilations: vec![1, 2, 4],
            gated: false,
            head_bias: false,
        },
        ArraySpec {
            input_size: 4,
            head_size: 1,
            channels: 2,
            kernel_size: 3,
            dilations: vec![1, 8],
            gated: true,
            head_bias: true,
        },
    ];
    let count = arrays.iter().map(ArraySpec::weight_count).sum::<usize>() + 1;
    let layers: Vec<Value> = arrays.iter().map(ArraySpec::to_json).collect();

    ModelDescriptor::new(
        Architecture::WaveNet,
        json!({"layers": layers, "head": null, "head_scale": 0.02}),
        weights(count, 4, 0.5),
    )
    .with_sample_rate(SAMPLE_RATE)
}

pub fn descriptor(architecture: Architecture) -> ModelDescriptor {
    match architecture {
        Architecture::Linear => linear(),
        Architecture::ConvNet => convnet(),
        Architecture::Lstm => lstm(),
        Architecture::WaveNet => wavenet(),
    }
}

/// Decaying noise IR long enough for the partitioned path
pub fn cabinet_taps(len: usize) -> Vec<f32> {
    weights(len, 9, 1.0)
        .into_iter()
        .enumerate()
        .map(|(i, w)| w * (-(i as f32) / (len as f32 / 6.0)).exp())
        .collect()
}
