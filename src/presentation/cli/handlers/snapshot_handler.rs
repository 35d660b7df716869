//! CLI Handler - Snapshot
//!
//! Handles the 'snapshot' command by invoking the round-trip use case.

use std::path::PathBuf;

use colored::Colorize;

use crate::application::use_cases::snapshot_roundtrip::{
    SnapshotParams, SnapshotRoundTripUseCase,
};
use crate::domain::geometry::NandGeometry;
use crate::domain::types::ByteSize;
use crate::error::Result;
use crate::infrastructure::ramdrive::DriveOptions;

pub struct SnapshotHandler;

impl Default for SnapshotHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(
        &self,
        geometry: NandGeometry,
        options: DriveOptions,
        file: PathBuf,
        pages: u64,
        seed: u64,
    ) -> Result<()> {
        println!("Snapshot round trip via {:?}...", file);

        let pb = super::create_progress_bar(pages * 2, "Round-tripping");
        let use_case = SnapshotRoundTripUseCase::new(geometry, options);
        let report = use_case.execute(SnapshotParams { file, pages, seed }, |progress| {
            pb.set_position(progress.current);
        })?;
        pb.finish_with_message("Round Trip Complete");

        println!();
        println!("Snapshot size:  {}", ByteSize(report.snapshot_bytes));
        println!(
            "Pages verified: {}",
            report.pages_verified.to_string().cyan()
        );
        println!("{}", "✓ Snapshot round trip passed".green());
        Ok(())
    }
}
