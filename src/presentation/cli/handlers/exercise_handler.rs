//! CLI Handler - Exercise
//!
//! Handles the 'exercise' command by invoking the exercise use case.

use std::path::PathBuf;

use colored::Colorize;

use crate::application::memio::MemIo;
use crate::application::use_cases::exercise::{ExerciseParams, ExerciseUseCase};
use crate::domain::geometry::NandGeometry;
use crate::domain::types::ByteSize;
use crate::error::{Error, Result};
use crate::infrastructure::ramdrive::DriveOptions;

pub struct ExerciseHandler;

impl Default for ExerciseHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ExerciseHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(
        &self,
        geometry: NandGeometry,
        options: DriveOptions,
        pages: u64,
        seed: u64,
        snapshot: Option<PathBuf>,
    ) -> Result<()> {
        println!(
            "Exercising {} pages across {} parallel units...",
            pages,
            geometry.chips_per_ssd()
        );

        let mut mio = MemIo::with_options(geometry, options)?;
        let pb = super::create_progress_bar(pages * 2, "Exercising");

        let mut use_case = ExerciseUseCase::new(&mut mio);
        let report = use_case.execute(ExerciseParams { pages, seed }, |progress| {
            pb.set_position(progress.current);
        })?;
        pb.finish_with_message("Exercise Complete");

        println!();
        println!(
            "Pages written:     {}",
            report.pages_written.to_string().cyan()
        );
        println!("Bytes verified:    {}", ByteSize(report.bytes_verified));
        println!("Corruption events: {}", report.corruption_events);

        if let Some(path) = snapshot {
            println!("Storing snapshot: {:?}", path);
            mio.drive().save(&path)?;
        }
        mio.close();

        if report.mismatches > 0 {
            println!("{}", "✗ Read-back verification FAILED".red().bold());
            return Err(Error::VerificationFailed {
                mismatches: report.mismatches,
                pages: report.pages_written,
            });
        }
        println!("{}", "✓ Read-back verification passed".green());
        Ok(())
    }
}
