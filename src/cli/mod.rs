//! CLI Module
//!
//! Command-line interface for rendering audio through a rig and inspecting
//! model files.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// namrig - neural amp model and cabinet IR renderer
#[derive(Parser, Debug)]
#[command(name = "namrig")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a WAV file through a model and/or impulse response
    #[command(name = "render")]
    Render {
        /// Input WAV file (multichannel input is mixed to mono)
        input: PathBuf,

        /// Output WAV file
        output: PathBuf,

        /// Model file (.nam)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Impulse response file (.wav)
        #[arg(short, long)]
        ir: Option<PathBuf>,

        /// Rig config file (JSON); --model and --ir override its entries
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Processing block size
        #[arg(short, long)]
        block_size: Option<usize>,

        /// Scale model output to the target loudness
        #[arg(long)]
        normalize: bool,

        /// Output bit depth (16, 24 or 32)
        #[arg(long, default_value_t = 24)]
        bit_depth: u16,
    },

    /// Print information about a model file
    #[command(name = "info")]
    Info {
        /// Model file (.nam)
        model: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List model and impulse-response files under a directory
    #[command(name = "scan")]
    Scan {
        /// Directory to search
        dir: PathBuf,
    },
}
