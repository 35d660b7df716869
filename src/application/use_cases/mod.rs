//! Application Use Cases
//!
//! Workload orchestration on top of the memio client.

pub mod exercise;
pub mod snapshot_roundtrip;

// Re-export use cases
pub use exercise::{ExerciseParams, ExerciseReport, ExerciseUseCase};
pub use snapshot_roundtrip::{SnapshotParams, SnapshotReport, SnapshotRoundTripUseCase};
