//! CLI Handlers Module
//!
//! Contains individual command handlers for the CLI.

pub mod exercise_handler;
pub mod info_handler;
pub mod snapshot_handler;

pub use exercise_handler::ExerciseHandler;
pub use info_handler::InfoHandler;
pub use snapshot_handler::SnapshotHandler;

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a standardized, stylish progress bar for drive workloads
pub fn create_progress_bar(total: u64, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages ({eta}) {msg}",
            )
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
