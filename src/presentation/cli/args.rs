//! CLI argument definitions using clap
//!
//! This module defines the command-line argument structure.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ramssd - a RAM-backed NAND SSD emulator workbench
///
/// Emulates a multi-channel NAND device in main memory and drives
/// workloads against it: geometry inspection, write/read-back
/// verification, and snapshot round trips.
#[derive(Parser, Debug)]
#[command(name = "ramssd")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Device profile as a TOML file (default: a small timing-less
    /// profile)
    #[arg(short = 'p', long = "profile", global = true)]
    pub profile: Option<PathBuf>,

    /// Completion mode override: ramdrive, user_ramdrive, ramdrive_intr,
    /// ramdrive_timing
    #[arg(short = 'm', long = "mode", global = true)]
    pub mode: Option<String>,

    /// Verify reads against the shadow mirror
    #[arg(short = 'c', long = "data-check", global = true)]
    pub data_check: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the emulated device's organization and derived sizes
    #[command(alias = "i")]
    Info,

    /// Run a write/read-back/verify workload against the drive
    #[command(alias = "x")]
    Exercise {
        /// Number of flash pages to touch
        #[arg(short = 'n', long, default_value = "1024")]
        pages: u64,

        /// Seed for the data pattern
        #[arg(short, long, default_value = "1")]
        seed: u64,

        /// Store a snapshot of the medium after the workload
        #[arg(short = 'o', long)]
        snapshot: Option<PathBuf>,
    },

    /// Verify that a stored snapshot round-trips byte-identically
    #[command(alias = "s")]
    Snapshot {
        /// Snapshot file path
        #[arg(short, long)]
        file: PathBuf,

        /// Number of pages to seed before the round trip
        #[arg(short = 'n', long, default_value = "256")]
        pages: u64,

        /// Seed for the data pattern
        #[arg(short, long, default_value = "1")]
        seed: u64,
    },
}
