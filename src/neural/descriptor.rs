//! Model descriptor: the validated-on-build, serde view of a model file
//!
//! A descriptor carries the architecture name, its JSON config, the flat
//! weight vector and optional metadata. It is plain data; turning it into a
//! runnable [`Model`](super::Model) is where topology is checked.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RigError, Result};

/// Newest file-format minor version understood (0.5.x)
pub const SUPPORTED_MINOR_VERSION: u32 = 5;

/// Architecture families the engine can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    Linear,
    ConvNet,
    #[serde(rename = "LSTM")]
    Lstm,
    WaveNet,
}

impl Architecture {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "Linear" => Ok(Architecture::Linear),
            "ConvNet" => Ok(Architecture::ConvNet),
            "LSTM" => Ok(Architecture::Lstm),
            "WaveNet" => Ok(Architecture::WaveNet),
            other => Err(RigError::load(
                "model",
                format!("unknown architecture '{}'", other),
            )),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Architecture::Linear => "Linear",
            Architecture::ConvNet => "ConvNet",
            Architecture::Lstm => "LSTM",
            Architecture::WaveNet => "WaveNet",
        }
    }
}

/// Optional descriptive metadata stored alongside the weights
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub modeled_by: Option<String>,
    #[serde(default)]
    pub gear_make: Option<String>,
    #[serde(default)]
    pub gear_model: Option<String>,
    #[serde(default)]
    pub gear_type: Option<String>,
    #[serde(default)]
    pub tone_type: Option<String>,
    /// Playback loudness in dB of a reference signal through the model
    #[serde(default)]
    pub loudness: Option<f64>,
    #[serde(default)]
    pub input_level_dbu: Option<f64>,
    #[serde(default)]
    pub output_level_dbu: Option<f64>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Everything needed to build a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub version: String,
    pub architecture: String,
    pub config: Value,
    pub weights: Vec<f32>,
    #[serde(default)]
    pub sample_rate: Option<f64>,
    #[serde(default)]
    pub metadata: Option<ModelMetadata>,
}

impl ModelDescriptor {
    /// Build a descriptor in the current file-format version
    pub fn new(architecture: Architecture, config: Value, weights: Vec<f32>) -> Self {
        Self {
            version: format!("0.{}.0", SUPPORTED_MINOR_VERSION),
            architecture: architecture.name().to_string(),
            config,
            weights,
            sample_rate: None,
            metadata: None,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    pub fn with_metadata(mut self, metadata: ModelMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Parse and check the architecture name
    pub fn architecture(&self) -> Result<Architecture> {
        Architecture::from_name(&self.architecture)
    }

    /// Check the file-format version
    ///
    /// Returns `true` when the version is older than the newest supported
    /// one but still readable.
    pub fn check_version(&self) -> Result<bool> {
        let mut parts = self.version.split('.');
        let parse = |part: Option<&str>| -> Result<u32> {
            part.and_then(|p| p.trim().parse().ok()).ok_or_else(|| {
                RigError::load("model", format!("malformed version '{}'", self.version))
            })
        };
        let major = parse(parts.next())?;
        let minor = parse(parts.next())?;

        if major != 0 || minor > SUPPORTED_MINOR_VERSION {
            return Err(RigError::load(
                "model",
                format!(
                    "unsupported model version {} (newest supported 0.{}.x)",
                    self.version, SUPPORTED_MINOR_VERSION
                ),
            ));
        }
        Ok(minor < SUPPORTED_MINOR_VERSION)
    }

    /// Deserialize the architecture config into its typed form
    pub(crate) fn typed_config<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        serde_json::from_value(self.config.clone()).map_err(|e| {
            RigError::load(
                "model",
                format!("invalid {} config: {}", self.architecture, e),
            )
        })
    }
}
