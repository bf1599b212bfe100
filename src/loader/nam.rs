//! `.nam` model files
//!
//! A model file is a JSON object with `version`, `architecture`, `config`,
//! `weights` and optional `sample_rate` / `metadata` fields.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{RigError, Result};
use crate::neural::{Model, ModelDescriptor, ToneModel};

/// File extension of model files
pub const MODEL_EXTENSION: &str = "nam";

/// Where a model comes from
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// A `.nam` file on disk
    Path(PathBuf),
    /// The raw contents of a `.nam` file
    Bytes(Vec<u8>),
    /// An already parsed `.nam` document
    Json(Value),
}

impl ModelSource {
    /// Name used in load errors and logs
    pub fn name(&self) -> String {
        match self {
            ModelSource::Path(path) => path.display().to_string(),
            ModelSource::Bytes(_) => "model bytes".to_string(),
            ModelSource::Json(_) => "model json".to_string(),
        }
    }
}

impl From<PathBuf> for ModelSource {
    fn from(path: PathBuf) -> Self {
        ModelSource::Path(path)
    }
}

/// Parse a source into a descriptor without building the network
///
/// # Errors
/// * `Load` - If the source cannot be read, is empty or is not a model
///   document
pub fn read_descriptor(source: &ModelSource) -> Result<ModelDescriptor> {
    let name = source.name();
    let parsed = match source {
        ModelSource::Path(path) => {
            let bytes = std::fs::read(path)
                .map_err(|e| RigError::load(&name, format!("cannot read file: {}", e)))?;
            parse_bytes(&bytes)
        }
        ModelSource::Bytes(bytes) => parse_bytes(bytes),
        ModelSource::Json(value) => serde_json::from_value(value.clone())
            .map_err(|e| RigError::load(&name, format!("not a model document: {}", e))),
    };
    parsed.map_err(|e| e.with_source_name(&name))
}

fn parse_bytes(bytes: &[u8]) -> Result<ModelDescriptor> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(RigError::load("model", "file is empty"));
    }
    serde_json::from_slice(bytes)
        .map_err(|e| RigError::load("model", format!("not a model document: {}", e)))
}

/// Load and validate a model
///
/// # Errors
/// * `Load` - On any read, parse or validation failure
pub fn load_model(source: &ModelSource) -> Result<Model> {
    let name = source.name();
    let desc = read_descriptor(source)?;
    let model = Model::from_descriptor(&desc).map_err(|e| e.with_source_name(&name))?;
    tracing::info!(
        source = %name,
        architecture = model.architecture().name(),
        fingerprint = %model.info().fingerprint,
        "loaded model"
    );
    Ok(model)
}

impl ToneModel {
    /// Load a model and wrap it in a fresh processor
    pub fn load(source: &ModelSource) -> Result<Self> {
        Ok(ToneModel::new(Arc::new(load_model(source)?)))
    }
}
