//! WAV file I/O
//!
//! Imports and exports mono audio for the offline render path and decodes
//! impulse responses for the loader. All samples are converted to 32-bit
//! float on import.

use std::io::Read;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::AudioBuffer;
use crate::error::{RigError, Result};

/// How multichannel files are folded to mono
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFold {
    /// Average all channels
    Mixdown,
    /// Keep the first channel only
    FirstChannel,
}

/// Export format configuration
#[derive(Debug, Clone, Copy)]
pub struct ExportFormat {
    /// Bit depth: 16, 24, or 32 (default: 24)
    pub bit_depth: u16,
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat { bit_depth: 24 }
    }
}

impl ExportFormat {
    /// Create a new export format with the given bit depth
    pub fn new(bit_depth: u16) -> Self {
        ExportFormat { bit_depth }
    }
}

/// Decode a WAV stream into a mono buffer
///
/// # Errors
/// * `Wav` - If the stream is not a valid WAV file
/// * `Load` - If the sample format is unsupported
pub fn read_wav<R: Read>(reader: R, fold: ChannelFold) -> Result<AudioBuffer> {
    let reader = WavReader::new(reader)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    let mono = fold_to_mono(&interleaved, channels, fold);

    AudioBuffer::from_samples(mono, spec.sample_rate as f64)
}

/// Import a WAV file as mono audio (channels are mixed down)
///
/// # Errors
/// * `Io` - If the file cannot be opened
/// * `Wav` - If the file is not a valid WAV file
pub fn import_audio(path: &Path) -> Result<AudioBuffer> {
    let file = std::fs::File::open(path)?;
    let buffer = read_wav(std::io::BufReader::new(file), ChannelFold::Mixdown)?;
    tracing::debug!(
        path = %path.display(),
        samples = buffer.len(),
        sample_rate = buffer.sample_rate(),
        "imported audio"
    );
    Ok(buffer)
}

/// Export a mono buffer to a WAV file at the buffer's sample rate
///
/// # Errors
/// * `Load` - If the bit depth is not 16, 24 or 32
/// * `Wav` / `Io` - If the file cannot be written
pub fn export_audio(buffer: &AudioBuffer, path: &Path, format: ExportFormat) -> Result<()> {
    let sample_format = match format.bit_depth {
        16 | 24 => SampleFormat::Int,
        32 => SampleFormat::Float,
        other => {
            return Err(RigError::load(
                path.display().to_string(),
                format!("{}-bit export (only 16, 24, 32 supported)", other),
            ))
        }
    };

    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate().round() as u32,
        bits_per_sample: format.bit_depth,
        sample_format,
    };

    let mut writer = WavWriter::create(path, spec)?;
    match format.bit_depth {
        16 => {
            for &sample in buffer.samples() {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled)?;
            }
        }
        24 => {
            for &sample in buffer.samples() {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled)?;
            }
        }
        _ => {
            for &sample in buffer.samples() {
                writer.write_sample(sample)?;
            }
        }
    }
    writer.finalize()?;

    tracing::debug!(path = %path.display(), samples = buffer.len(), "exported audio");
    Ok(())
}

// ============================================================================
// Internal helper functions
// ============================================================================

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let samples = match sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = match bits_per_sample {
                8 => 128.0,
                16 => 32768.0,
                24 => 8388608.0,
                32 => 2147483648.0,
                other => {
                    return Err(RigError::load(
                        "wav",
                        format!("{}-bit integer audio is not supported", other),
                    ))
                }
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };
    Ok(samples)
}

/// Fold interleaved frames to a single channel
fn fold_to_mono(interleaved: &[f32], channels: usize, fold: ChannelFold) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| match fold {
            ChannelFold::Mixdown => frame.iter().sum::<f32>() / channels as f32,
            ChannelFold::FirstChannel => frame[0],
        })
        .collect()
}
