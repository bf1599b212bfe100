//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

use crate::config::{ConvolutionSettings, RigConfig};
use crate::engine::{export_audio, import_audio, AudioBuffer, ExportFormat, StreamProcessor};
use crate::loader::{read_descriptor, ModelSource, MODEL_EXTENSION};
use crate::neural::Model;

/// Arguments of the `render` command
#[derive(Debug, Clone)]
pub struct RenderArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    pub model: Option<PathBuf>,
    pub ir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub block_size: Option<usize>,
    pub normalize: bool,
    pub bit_depth: u16,
}

/// Combine the config file (if any) with command-line overrides
fn rig_config(args: &RenderArgs, input_rate: f64) -> Result<RigConfig> {
    let mut config = match &args.config {
        Some(path) => RigConfig::from_file(path)
            .with_context(|| format!("reading rig config {}", path.display()))?,
        None => {
            let mut config = RigConfig::default();
            config.engine.sample_rate = input_rate;
            config
        }
    };

    if let Some(model) = &args.model {
        config.model = Some(model.clone());
    }
    if let Some(ir) = &args.ir {
        config.impulse_response = Some(ConvolutionSettings::new(ir.clone()));
    }
    if let Some(block_size) = args.block_size {
        config.engine.block_size = block_size;
    }
    if args.normalize {
        config.normalize_output = true;
    }

    if config.model.is_none() && config.impulse_response.is_none() {
        bail!("nothing to render: give a model, an impulse response or a rig config");
    }
    if (config.engine.sample_rate - input_rate).abs() > 0.5 {
        bail!(
            "input is {} Hz but the rig runs at {} Hz",
            input_rate,
            config.engine.sample_rate
        );
    }
    Ok(config)
}

/// Render an input file through the rig, block by block.
pub fn render(args: &RenderArgs) -> Result<()> {
    tracing::info!("Rendering {}", args.input.display());

    let input = import_audio(&args.input)
        .with_context(|| format!("reading input {}", args.input.display()))?;
    let config = rig_config(args, input.sample_rate())?;
    let mut pipeline = config.build_pipeline().context("building rig")?;

    let block_size = pipeline.block_size();
    let mut output = AudioBuffer::new(input.len(), input.sample_rate());
    for (inp, out) in input
        .samples()
        .chunks(block_size)
        .zip(output.samples_mut().chunks_mut(block_size))
    {
        pipeline.process(inp, out)?;
    }

    export_audio(&output, &args.output, ExportFormat::new(args.bit_depth))
        .with_context(|| format!("writing output {}", args.output.display()))?;

    println!("Rendered: {}", args.output.display());
    println!("Samples: {} @ {} Hz", output.len(), output.sample_rate());
    println!("Peak: {:.1} dBFS", output.peak_db());
    Ok(())
}

/// Print model information.
pub fn info(path: &Path, as_json: bool) -> Result<()> {
    let desc = read_descriptor(&ModelSource::Path(path.to_path_buf()))?;
    let model = Model::from_descriptor(&desc)
        .map_err(|e| e.with_source_name(path.display().to_string()))?;
    let info = model.info();

    if as_json {
        println!("{}", serde_json::to_string_pretty(info)?);
        return Ok(());
    }

    println!("Model: {}", path.display());
    println!("{:-<60}", "");
    println!("Architecture: {}", info.architecture.name());
    println!("Version: {}", info.version);
    match info.expected_sample_rate {
        Some(rate) => println!("Sample rate: {} Hz", rate),
        None => println!("Sample rate: (not declared)"),
    }
    println!("Receptive field: {} samples", info.receptive_field);
    println!("Weights: {}", info.num_weights);
    if let Some(loudness) = info.loudness() {
        println!("Loudness: {:.1} dB", loudness);
    }
    if let Some(name) = &info.metadata.name {
        println!("Name: {}", name);
    }
    if let Some(author) = &info.metadata.modeled_by {
        println!("Modeled by: {}", author);
    }
    println!("Fingerprint: {}", info.fingerprint);
    Ok(())
}

/// List `.nam` and `.wav` files under a directory.
pub fn scan(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }

    let mut models = 0;
    let mut irs = 0;
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        let path = entry.path();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some(MODEL_EXTENSION) => {
                models += 1;
                match read_descriptor(&ModelSource::Path(path.to_path_buf())) {
                    Ok(desc) => println!(
                        "model  {}  {} v{}",
                        path.display(),
                        desc.architecture,
                        desc.version
                    ),
                    Err(e) => println!("model  {}  (unreadable: {})", path.display(), e),
                }
            }
            Some("wav") => {
                irs += 1;
                match hound::WavReader::open(path) {
                    Ok(reader) => {
                        let spec = reader.spec();
                        println!(
                            "ir     {}  {} Hz, {} ch, {} samples",
                            path.display(),
                            spec.sample_rate,
                            spec.channels,
                            reader.duration()
                        );
                    }
                    Err(e) => println!("ir     {}  (unreadable: {})", path.display(), e),
                }
            }
            _ => {}
        }
    }

    println!("{:-<60}", "");
    println!("{} model(s), {} impulse response(s)", models, irs);
    Ok(())
}
