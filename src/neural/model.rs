//! Loaded model and its per-stream state
//!
//! `Model` is immutable once built and meant to be shared through `Arc`
//! between any number of streams. Each stream owns a `ModelState`. Both are
//! closed enums over the architecture families, so the family is chosen
//! once at load time and each block costs a single `match`.

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::convnet::{ConvNetConfig, ConvNetModel, ConvNetState};
use super::descriptor::{Architecture, ModelDescriptor, ModelMetadata};
use super::linear::{LinearConfig, LinearModel, LinearState};
use super::lstm::{LstmConfig, LstmModel, LstmState};
use super::tensor::{WeightCursor, MAX_HISTORY_VALUES};
use super::wavenet::{WaveNetConfig, WaveNetModel, WaveNetState};
use crate::engine::{is_supported_rate, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};
use crate::error::{RigError, Result};

/// Seconds of silence an LSTM is primed with
const LSTM_PREWARM_SECONDS: f64 = 0.5;

/// Descriptive information about a loaded model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub architecture: Architecture,
    pub version: String,
    /// Sample rate the model was trained at, when the file declares one
    pub expected_sample_rate: Option<f64>,
    pub receptive_field: usize,
    pub num_weights: usize,
    /// Hex SHA-256 over architecture, config and weights
    pub fingerprint: String,
    pub metadata: ModelMetadata,
}

impl ModelInfo {
    /// Playback loudness recorded by the model's author, if any
    pub fn loudness(&self) -> Option<f64> {
        self.metadata.loudness
    }
}

/// Architecture-specific parameters
#[derive(Debug, Clone)]
pub enum Network {
    Linear(LinearModel),
    ConvNet(ConvNetModel),
    Lstm(LstmModel),
    WaveNet(WaveNetModel),
}

/// Immutable trained model
#[derive(Debug, Clone)]
pub struct Model {
    info: ModelInfo,
    network: Network,
}

impl Model {
    /// Validate a descriptor and build the network it describes
    ///
    /// # Errors
    /// * `Load` - On unknown architecture, unsupported version, malformed
    ///   config, non-finite weights or a weight count that does not match
    ///   the topology
    pub fn from_descriptor(desc: &ModelDescriptor) -> Result<Self> {
        let architecture = desc.architecture()?;
        if desc.check_version()? {
            tracing::warn!(
                version = %desc.version,
                "model file predates the current format; loading anyway"
            );
        }
        if let Some(rate) = desc.sample_rate {
            if !is_supported_rate(rate) {
                return Err(RigError::load(
                    "model",
                    format!(
                        "sample rate {} outside {}..={} Hz",
                        rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
                    ),
                ));
            }
        }
        if desc.weights.is_empty() {
            return Err(RigError::load("model", "model has no weights"));
        }
        if let Some(pos) = desc.weights.iter().position(|w| !w.is_finite()) {
            return Err(RigError::load(
                "model",
                format!("non-finite weight at index {}", pos),
            ));
        }

        let mut cursor = WeightCursor::new(&desc.weights);
        let network = match architecture {
            Architecture::Linear => {
                let config: LinearConfig = desc.typed_config()?;
                Network::Linear(LinearModel::build(&config, &mut cursor)?)
            }
            Architecture::ConvNet => {
                let config: ConvNetConfig = desc.typed_config()?;
                Network::ConvNet(ConvNetModel::build(&config, &mut cursor)?)
            }
            Architecture::Lstm => {
                let config: LstmConfig = desc.typed_config()?;
                Network::Lstm(LstmModel::build(&config, &mut cursor)?)
            }
            Architecture::WaveNet => {
                let config: WaveNetConfig = desc.typed_config()?;
                Network::WaveNet(WaveNetModel::build(&config, &mut cursor)?)
            }
        };
        cursor.finish()?;

        let history = match &network {
            Network::ConvNet(m) => m.history_values(),
            Network::WaveNet(m) => m.history_values(),
            Network::Linear(m) => m.receptive_field(),
            Network::Lstm(_) => 0,
        };
        if history > MAX_HISTORY_VALUES {
            return Err(RigError::load(
                "model",
                format!(
                    "model keeps {} history values per stream (limit {})",
                    history, MAX_HISTORY_VALUES
                ),
            ));
        }

        let receptive_field = match &network {
            Network::Linear(m) => m.receptive_field(),
            Network::ConvNet(m) => m.receptive_field(),
            Network::Lstm(_) => 1,
            Network::WaveNet(m) => m.receptive_field(),
        };

        let info = ModelInfo {
            architecture,
            version: desc.version.clone(),
            expected_sample_rate: desc.sample_rate,
            receptive_field,
            num_weights: desc.weights.len(),
            fingerprint: fingerprint(desc),
            metadata: desc.metadata.clone().unwrap_or_default(),
        };
        tracing::debug!(
            architecture = architecture.name(),
            receptive_field,
            weights = info.num_weights,
            "built model"
        );

        Ok(Self { info, network })
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    pub fn architecture(&self) -> Architecture {
        self.info.architecture
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn receptive_field(&self) -> usize {
        self.info.receptive_field
    }

    /// Number of silent samples needed to settle a freshly reset state
    /// running at `sample_rate`
    pub fn prewarm_samples(&self, sample_rate: f64) -> usize {
        match &self.network {
            Network::Lstm(_) => {
                let rate = sample_rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE);
                (LSTM_PREWARM_SECONDS * rate).round() as usize
            }
            _ => self.info.receptive_field,
        }
    }
}

fn fingerprint(desc: &ModelDescriptor) -> String {
    let mut hasher = Sha256::new();
    hasher.update(desc.architecture.as_bytes());
    hasher.update(desc.config.to_string().as_bytes());
    for w in &desc.weights {
        hasher.update(w.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Mutable per-stream history of a model
#[derive(Debug, Clone)]
pub enum ModelState {
    Linear(LinearState),
    ConvNet(ConvNetState),
    Lstm(LstmState),
    WaveNet(WaveNetState),
}

impl ModelState {
    /// Allocate state sized for `model`, in its initial value
    pub fn new(model: &Model) -> Self {
        match &model.network {
            Network::Linear(m) => ModelState::Linear(LinearState::new(m)),
            Network::ConvNet(m) => ModelState::ConvNet(ConvNetState::new(m)),
            Network::Lstm(m) => ModelState::Lstm(LstmState::new(m)),
            Network::WaveNet(m) => ModelState::WaveNet(WaveNetState::new(m)),
        }
    }

    /// Restore the initial value without reallocating
    pub fn reset(&mut self, model: &Model) {
        match (self, &model.network) {
            (ModelState::Linear(s), Network::Linear(_)) => s.reset(),
            (ModelState::ConvNet(s), Network::ConvNet(_)) => s.reset(),
            (ModelState::Lstm(s), Network::Lstm(m)) => s.reset(m),
            (ModelState::WaveNet(s), Network::WaveNet(_)) => s.reset(),
            (state, _) => *state = ModelState::new(model),
        }
    }

    /// Advance the model over one block
    pub fn render(&mut self, model: &Model, input: &[f32], output: &mut [f32]) {
        match (self, &model.network) {
            (ModelState::Linear(s), Network::Linear(m)) => s.render(m, input, output),
            (ModelState::ConvNet(s), Network::ConvNet(m)) => s.render(m, input, output),
            (ModelState::Lstm(s), Network::Lstm(m)) => s.render(m, input, output),
            (ModelState::WaveNet(s), Network::WaveNet(m)) => s.render(m, input, output),
            (state, _) => {
                // state built for another model; rebuild and retry
                *state = ModelState::new(model);
                state.render(model, input, output);
            }
        }
    }
}
