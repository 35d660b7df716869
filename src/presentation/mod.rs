//! Presentation Layer
//!
//! User interfaces for the emulator workbench.

pub mod cli;
