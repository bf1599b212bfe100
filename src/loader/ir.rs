//! Impulse-response files
//!
//! IRs are WAV files (any bit depth hound decodes). Multichannel captures
//! keep their first channel. The taps are resampled to the processing rate,
//! scaled and optionally truncated before they are frozen.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use crate::dsp::{ConvolutionProcessor, ImpulseResponse};
use crate::engine::buffer::{db_to_linear, DEFAULT_SAMPLE_RATE};
use crate::engine::io::{read_wav, ChannelFold};
use crate::error::{RigError, Result};

/// Rate the default IR gain is calibrated at
pub const IR_REFERENCE_RATE: f64 = 48000.0;

/// Default IR gain (dB)
const DEFAULT_IR_GAIN_DB: f32 = -18.0;

/// Where an impulse response comes from
#[derive(Debug, Clone)]
pub enum IrSource {
    /// A WAV file on disk
    Path(PathBuf),
    /// The raw contents of a WAV file
    Bytes(Vec<u8>),
    /// Taps already in memory
    Taps { taps: Vec<f32>, sample_rate: f64 },
}

impl IrSource {
    pub fn name(&self) -> String {
        match self {
            IrSource::Path(path) => path.display().to_string(),
            IrSource::Bytes(_) => "impulse response bytes".to_string(),
            IrSource::Taps { .. } => "impulse response taps".to_string(),
        }
    }
}

/// How a loaded IR is prepared for processing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrLoadOptions {
    /// Rate the IR will be processed at
    pub sample_rate: f64,
    /// Gain applied to the taps, or `None` to keep them as recorded.
    /// The gain is compensated for the tap density of the target rate
    /// relative to [`IR_REFERENCE_RATE`].
    pub gain_db: Option<f32>,
    /// Drop taps beyond this length
    pub max_taps: Option<usize>,
}

impl Default for IrLoadOptions {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            gain_db: Some(DEFAULT_IR_GAIN_DB),
            max_taps: None,
        }
    }
}

impl IrLoadOptions {
    /// Resample only; taps keep their level and length
    pub fn raw(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            gain_db: None,
            max_taps: None,
        }
    }

    fn linear_gain(&self) -> Option<f32> {
        self.gain_db
            .map(|db| db_to_linear(db) * (IR_REFERENCE_RATE / self.sample_rate) as f32)
    }
}

/// Decode and prepare an impulse response
///
/// # Errors
/// * `Load` - If the source cannot be read or decoded, holds no samples or
///   the target rate is unusable
pub fn load_impulse_response(source: &IrSource, options: &IrLoadOptions) -> Result<ImpulseResponse> {
    let name = source.name();
    prepare(source, options).map_err(|e| match e {
        RigError::Load { .. } => e.with_source_name(&name),
        other => RigError::load(&name, other.to_string()),
    })
}

fn prepare(source: &IrSource, options: &IrLoadOptions) -> Result<ImpulseResponse> {
    let captured = match source {
        IrSource::Path(path) => {
            let bytes = std::fs::read(path)?;
            decode(&bytes)?
        }
        IrSource::Bytes(bytes) => decode(bytes)?,
        IrSource::Taps { taps, sample_rate } => ImpulseResponse::new(taps.clone(), *sample_rate)?,
    };

    let mut ir = captured.resampled(options.sample_rate)?;
    if let Some(gain) = options.linear_gain() {
        ir = ir.scaled(gain);
    }
    if let Some(max_taps) = options.max_taps {
        ir = ir.truncated(max_taps);
    }

    tracing::info!(
        source = %source.name(),
        captured_rate = captured.sample_rate(),
        sample_rate = ir.sample_rate(),
        taps = ir.len(),
        "loaded impulse response"
    );
    Ok(ir)
}

fn decode(bytes: &[u8]) -> Result<ImpulseResponse> {
    if bytes.is_empty() {
        return Err(RigError::load("impulse response", "file is empty"));
    }
    let buffer = read_wav(Cursor::new(bytes), ChannelFold::FirstChannel)?;
    ImpulseResponse::from_buffer(buffer)
}

impl ConvolutionProcessor {
    /// Load an IR prepared for `options.sample_rate` and build a processor
    /// running at that rate
    pub fn load(source: &IrSource, options: &IrLoadOptions) -> Result<Self> {
        let ir = load_impulse_response(source, options)?;
        ConvolutionProcessor::new(Arc::new(ir), options.sample_rate)
    }
}
