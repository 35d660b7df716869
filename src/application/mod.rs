//! Application Layer
//!
//! Orchestrates workloads on top of the drive: the memio bulk-I/O client
//! and the use cases built on it.

pub mod memio;
pub mod use_cases;

// Re-export commonly used types
pub use memio::MemIo;
pub use use_cases::{
    ExerciseParams, ExerciseReport, ExerciseUseCase, SnapshotParams, SnapshotReport,
    SnapshotRoundTripUseCase,
};
