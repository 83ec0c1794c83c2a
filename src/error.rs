//! Custom error types for the acquisition pipeline.
//!
//! This module defines the primary error type, `AcqError`, used throughout the
//! crate. Using the `thiserror` crate, it provides one consistent place for the
//! failure conditions the pipeline can hit, from configuration problems to
//! serial-link and storage faults.
//!
//! Two conditions are deliberately *not* errors and never appear here:
//!
//! - A serial read timeout (the link simply had nothing to say yet); the
//!   synchronizer keeps accumulating.
//! - A missed header scan; the synchronizer recovers locally by trimming its
//!   window and reading more bytes.
//!
//! Capacity exhaustion (all segments full before the sample budget was met) is
//! a normal termination condition reported through
//! [`StopReason`](crate::acquisition::StopReason), not an error. The only
//! exception is an append attempted *after* the rotator has terminated, which
//! is a caller bug surfaced as [`AcqError::SegmentsExhausted`].

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AcqResult<T> = std::result::Result<T, AcqError>;

/// Errors produced by the acquisition pipeline.
#[derive(Error, Debug)]
pub enum AcqError {
    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration parsed but failed semantic validation.
    #[error("configuration validation error: {0}")]
    Configuration(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial link failed fatally (device gone, permission revoked,
    /// open refused). A hardware stream cannot be replayed, so this is
    /// never retried.
    #[error("serial link error: {0}")]
    Link(String),

    /// A segment backing file could not be created, sized, or mapped.
    /// Segments completed before this point remain valid on disk.
    #[error("failed to allocate segment file {path}: {source}")]
    StorageAllocation {
        /// Path of the segment file that could not be allocated.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// An append was attempted after every configured segment filled up.
    #[error("all {0} storage segments are full")]
    SegmentsExhausted(u32),

    /// Serial support not compiled in.
    #[error("serial support not enabled. Rebuild with --features serial")]
    SerialFeatureDisabled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_allocation_message_names_the_path() {
        let err = AcqError::StorageAllocation {
            path: PathBuf::from("/data/segment-3"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        let msg = err.to_string();
        assert!(msg.contains("segment-3"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn segments_exhausted_reports_the_count() {
        let err = AcqError::SegmentsExhausted(32);
        assert!(err.to_string().contains("32"));
    }
}
