//! ramssd-rs library
//!
//! This library emulates a multi-channel NAND SSD entirely in main memory.
//! It serves page-granular read/program/erase commands on behalf of a flash
//! translation layer, executes one command at a time per (channel, chip)
//! parallel unit, and can delay completions to mimic real NAND latencies.
//!
//! # Architecture
//!
//! The library is organized into layered architecture:
//!
//! - [`domain`]: Device geometry and the request vocabulary
//! - [`application`]: The memio bulk-I/O client and workload use cases
//! - [`infrastructure`]: The RAM drive itself (page engine, timing, shadow)
//! - [`presentation`]: User interfaces (CLI)
//! - [`error`]: Error types and handling
//!
//! # Example
//!
//! ```ignore
//! use ramssd_rs::presentation::cli::args::Args;
//! use ramssd_rs::presentation::cli;
//! use clap::Parser;
//!
//! // Parse and execute
//! let args = Args::parse();
//! if let Err(e) = cli::execute(args) {
//!     eprintln!("Error: {}", e);
//! }
//! ```

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod presentation;

pub use error::{Error, Result};
