//! CLI Presentation Module
//!
//! Entry point for the CLI presentation layer.

pub mod args;
pub mod handlers;

use std::path::Path;

use crate::domain::geometry::{DeviceType, NandGeometry};
use crate::error::{Error, Result};
use crate::infrastructure::ramdrive::DriveOptions;
use args::{Args, Command};
use handlers::*;

/// Load a device profile from a TOML file
fn load_profile(path: &Path) -> Result<NandGeometry> {
    let text = std::fs::read_to_string(path)?;
    let geometry: NandGeometry = toml::from_str(&text)
        .map_err(|e| Error::InvalidParameter(format!("bad device profile: {e}")))?;
    geometry.validate()?;
    Ok(geometry)
}

fn parse_mode(raw: &str) -> Result<DeviceType> {
    match raw {
        "ramdrive" => Ok(DeviceType::Ramdrive),
        "user_ramdrive" => Ok(DeviceType::UserRamdrive),
        "ramdrive_intr" => Ok(DeviceType::RamdriveIntr),
        "ramdrive_timing" => Ok(DeviceType::RamdriveTiming),
        other => Err(Error::InvalidParameter(format!(
            "unknown completion mode '{other}'"
        ))),
    }
}

/// Execute the command specified by CLI arguments
pub fn execute(args: Args) -> Result<()> {
    let mut geometry = match &args.profile {
        Some(path) => load_profile(path)?,
        None => NandGeometry::default_profile(),
    };
    if let Some(mode) = &args.mode {
        geometry.device_type = parse_mode(mode)?;
    }
    let options = DriveOptions {
        data_check: args.data_check,
    };

    match args.command {
        Command::Info => {
            let handler = InfoHandler::new();
            handler.handle(&geometry)
        }
        Command::Exercise {
            pages,
            seed,
            snapshot,
        } => {
            let handler = ExerciseHandler::new();
            handler.handle(geometry, options, pages, seed, snapshot)
        }
        Command::Snapshot { file, pages, seed } => {
            let handler = SnapshotHandler::new();
            handler.handle(geometry, options, file, pages, seed)
        }
    }
}
