//! Error types for ramssd-rs
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ramssd-rs
#[derive(Error, Debug)]
pub enum Error {
    /// Page or block coordinates fall outside the device geometry.
    /// Indicates a broken issuing layer, not a device condition.
    #[error(
        "address out of range: channel={channel} chip={chip} block={block} page={page}"
    )]
    BadAddress {
        channel: usize,
        chip: usize,
        block: usize,
        page: usize,
    },

    /// The flash page size does not divide into host pages
    #[error("flash page size {page_main_size} is not a multiple of the host page size {host_page_size}")]
    GeometryMismatch {
        page_main_size: usize,
        host_page_size: usize,
    },

    /// Request buffers do not match the device geometry
    #[error("malformed request: buffer shapes do not match the device geometry")]
    BadRequest,

    /// A second request was issued to an occupied parallel unit
    #[error("parallel unit {punit} already holds an in-flight request")]
    DoubleIssue { punit: usize },

    /// Read-back verification failed
    #[error("verification failed: {mismatches} of {pages} pages differed")]
    VerificationFailed { mismatches: u64, pages: u64 },

    /// Invalid parameter
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
