//! Audio Engine Module
//!
//! Shared scaffolding for every processing stage:
//! - Audio buffer and fixed-capacity history storage
//! - The streaming processor contract
//! - WAV file I/O around the core

pub mod buffer;
pub mod io;
pub mod processor;

pub use buffer::{
    db_to_linear, is_supported_rate, linear_to_db, AudioBuffer, HistoryRing, DEFAULT_BLOCK_SIZE,
    DEFAULT_SAMPLE_RATE, MAX_BLOCK_SIZE, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE,
};
pub use io::{export_audio, import_audio, read_wav, ChannelFold, ExportFormat};
pub use processor::{clamp_block_size, for_each_sub_block, validate_block, StreamProcessor};
