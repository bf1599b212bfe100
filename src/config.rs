//! Rig configuration
//!
//! A rig is a tone model followed by an impulse response, described by a
//! small JSON file:
//!
//! ```json
//! {
//!   "engine": { "sample_rate": 48000, "block_size": 256, "prewarm": true },
//!   "model": "amps/plexi.nam",
//!   "normalize_output": true,
//!   "impulse_response": { "path": "cabs/4x12.wav", "method": "auto" }
//! }
//! ```
//!
//! Relative paths are resolved against the directory of the config file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dsp::{ConvolutionMethod, ConvolutionProcessor, ProcessingPipeline};
use crate::engine::buffer::{DEFAULT_BLOCK_SIZE, DEFAULT_SAMPLE_RATE};
use crate::engine::StreamProcessor;
use crate::error::Result;
use crate::loader::{load_impulse_response, IrLoadOptions, IrSource, ModelSource};
use crate::neural::ToneModel;

/// Processing rate and block size shared by every stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub sample_rate: f64,
    pub block_size: usize,
    /// Run `prewarm` on the pipeline after building it
    pub prewarm: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            prewarm: true,
        }
    }
}

fn default_ir_gain() -> Option<f32> {
    IrLoadOptions::default().gain_db
}

/// Cabinet / room impulse response stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvolutionSettings {
    pub path: PathBuf,
    #[serde(default)]
    pub method: ConvolutionMethod,
    #[serde(default = "default_ir_gain")]
    pub gain_db: Option<f32>,
    #[serde(default)]
    pub max_taps: Option<usize>,
}

impl ConvolutionSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            method: ConvolutionMethod::Auto,
            gain_db: default_ir_gain(),
            max_taps: None,
        }
    }
}

/// Complete rig description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RigConfig {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub model: Option<PathBuf>,
    #[serde(default)]
    pub normalize_output: bool,
    #[serde(default)]
    pub impulse_response: Option<ConvolutionSettings>,
}

impl RigConfig {
    /// Parse a config from JSON text; paths are kept as written
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a config file, resolving relative paths against its directory
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_json_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        tracing::debug!(path = %path.display(), "read rig config");
        Ok(config)
    }

    /// Write the config as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        if let Some(model) = &mut self.model {
            if model.is_relative() {
                *model = base.join(&*model);
            }
        }
        if let Some(ir) = &mut self.impulse_response {
            if ir.path.is_relative() {
                ir.path = base.join(&ir.path);
            }
        }
    }

    /// Load every stage and assemble a ready-to-run pipeline
    ///
    /// The pipeline is reset to the engine settings and, if enabled,
    /// prewarmed.
    ///
    /// # Errors
    /// * `Load` - If the model or IR cannot be loaded
    /// * `UnsupportedSampleRate` - If the model was trained at another rate
    pub fn build_pipeline(&self) -> Result<ProcessingPipeline> {
        let EngineSettings {
            sample_rate,
            block_size,
            prewarm,
        } = self.engine;
        let mut pipeline = ProcessingPipeline::new();

        if let Some(path) = &self.model {
            let mut tone = ToneModel::load(&ModelSource::Path(path.clone()))?;
            tone.set_output_normalization(self.normalize_output);
            pipeline.add(Box::new(tone));
        }

        if let Some(settings) = &self.impulse_response {
            let options = IrLoadOptions {
                sample_rate,
                gain_db: settings.gain_db,
                max_taps: settings.max_taps,
            };
            let ir = load_impulse_response(&IrSource::Path(settings.path.clone()), &options)?;
            let conv =
                ConvolutionProcessor::with_method(Arc::new(ir), sample_rate, settings.method)?;
            pipeline.add(Box::new(conv));
        }

        pipeline.reset(sample_rate, block_size)?;
        if prewarm {
            pipeline.prewarm();
        }
        tracing::info!(
            stages = pipeline.len(),
            sample_rate,
            block_size,
            "rig ready"
        );
        Ok(pipeline)
    }
}
