//! namrig CLI
//!
//! Command-line front end for offline rendering and model inspection.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use namrig::cli::{commands, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("namrig v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Render {
            input,
            output,
            model,
            ir,
            config,
            block_size,
            normalize,
            bit_depth,
        } => commands::render(&commands::RenderArgs {
            input,
            output,
            model,
            ir,
            config,
            block_size,
            normalize,
            bit_depth,
        }),
        Commands::Info { model, json } => commands::info(&model, json),
        Commands::Scan { dir } => commands::scan(&dir),
    }
}
