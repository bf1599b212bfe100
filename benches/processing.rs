//! Processing Benchmarks
//!
//! Per-block cost of the tone models and both convolution methods at a
//! typical host block size.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use namrig::{
    ConvolutionMethod, ConvolutionProcessor, ImpulseResponse, ModelDescriptor, StreamProcessor,
    ToneModel,
};
use serde_json::json;

const BLOCK: usize = 256;
const SAMPLE_RATE: f64 = 48000.0;

fn block() -> Vec<f32> {
    (0..BLOCK)
        .map(|i| (i as f32 * 0.05).sin() * 0.5)
        .collect()
}

fn ramp_weights(count: usize) -> Vec<f32> {
    (0..count)
        .map(|i| ((i * 37) % 101) as f32 / 101.0 - 0.5)
        .collect()
}

fn benchmark_lstm(c: &mut Criterion) {
    // 1 layer, hidden 16: 64*17 + 64 + 32 + 17
    let desc = ModelDescriptor::new(
        namrig::Architecture::Lstm,
        json!({"num_layers": 1, "input_size": 1, "hidden_size": 16}),
        ramp_weights(64 * 17 + 64 + 32 + 17),
    );
    let mut tone = ToneModel::from_descriptor(&desc).unwrap();
    let input = block();
    let mut output = vec![0.0; BLOCK];

    c.bench_function("lstm_h16_block256", |b| {
        b.iter(|| tone.process(black_box(&input), &mut output).unwrap())
    });
}

fn benchmark_linear(c: &mut Criterion) {
    let desc = ModelDescriptor::new(
        namrig::Architecture::Linear,
        json!({"receptive_field": 128, "bias": false}),
        ramp_weights(128),
    );
    let mut tone = ToneModel::from_descriptor(&desc).unwrap();
    let input = block();
    let mut output = vec![0.0; BLOCK];

    c.bench_function("linear_rf128_block256", |b| {
        b.iter(|| tone.process(black_box(&input), &mut output).unwrap())
    });
}

fn benchmark_convolution(c: &mut Criterion) {
    let taps: Vec<f32> = (0..4096)
        .map(|i| (-(i as f32) / 600.0).exp() * (((i * 13) % 17) as f32 / 17.0 - 0.5))
        .collect();
    let ir = Arc::new(ImpulseResponse::new(taps, SAMPLE_RATE).unwrap());
    let input = block();
    let mut output = vec![0.0; BLOCK];

    for method in [ConvolutionMethod::Direct, ConvolutionMethod::Partitioned] {
        let mut conv = ConvolutionProcessor::with_method(Arc::clone(&ir), SAMPLE_RATE, method)
            .unwrap();
        conv.reset(SAMPLE_RATE, BLOCK).unwrap();
        let name = format!("ir4096_{:?}_block256", method).to_lowercase();
        c.bench_function(&name, |b| {
            b.iter(|| conv.process(black_box(&input), &mut output).unwrap())
        });
    }
}

criterion_group!(benches, benchmark_lstm, benchmark_linear, benchmark_convolution);
criterion_main!(benches);
