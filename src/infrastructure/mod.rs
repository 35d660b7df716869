//! Infrastructure Layer
//!
//! Technology-specific implementation of the device model: the RAM-backed
//! drive with its page engine, shadow verifier, and timing drivers.

pub mod ramdrive;
