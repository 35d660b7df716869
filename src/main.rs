//! ramssd - RAM-backed NAND SSD emulator workbench
//!
//! This is the main entry point for the CLI application.

use anyhow::Result;
use clap::Parser;
use log::info;

use ramssd_rs::presentation::cli::{self, args::Args};

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    info!("ramssd-rs v{}", env!("CARGO_PKG_VERSION"));

    // Execute the command
    cli::execute(args)?;

    Ok(())
}
