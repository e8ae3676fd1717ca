//! Core types for image storage

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while ingesting or deriving images
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error opening, creating, copying, renaming or removing a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Source bytes do not decode as an image of the configured format
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// Thumbnail bytes could not be produced
    #[error("Failed to encode thumbnail: {0}")]
    Encode(#[source] image::ImageError),

    /// Image (or requested thumbnail) has a zero dimension
    #[error("Degenerate image dimensions {width}x{height}")]
    Degenerate {
        /// Decoded or requested width
        width: u32,
        /// Decoded or requested height
        height: u32,
    },

    /// Invalid storage root
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// The thumbnail worker could not run to completion
    #[error("Thumbnail worker failed: {0}")]
    Worker(String),
}

impl StorageError {
    /// Whether the error was caused by the uploaded content rather than the host
    #[must_use]
    pub const fn is_content_error(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Degenerate { .. })
    }
}

impl From<tempfile::PathPersistError> for StorageError {
    fn from(err: tempfile::PathPersistError) -> Self {
        Self::Io(err.error)
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Which artifact of a pair a path refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Artifact {
    /// The as-uploaded image
    Canonical,
    /// The derived square thumbnail
    Thumbnail,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Canonical => write!(f, "canonical"),
            Self::Thumbnail => write!(f, "thumbnail"),
        }
    }
}

/// A removal that failed during best-effort cleanup
#[derive(Debug)]
pub struct CleanupFailure {
    /// Which artifact could not be removed
    pub artifact: Artifact,
    /// Path that could not be removed
    pub path: PathBuf,
    /// Underlying I/O error
    pub error: std::io::Error,
}

/// Outcome of a best-effort delete
///
/// Deleting never fails the caller. Removals that did fail for reasons other
/// than the file already being gone are reported here and logged.
#[derive(Debug, Default)]
pub struct Cleanup {
    /// Removals that failed
    pub failures: Vec<CleanupFailure>,
}

impl Cleanup {
    /// True when every artifact is gone
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Summary of a crash-recovery sweep
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Names whose missing thumbnail was rebuilt
    pub regenerated: Vec<String>,
    /// Names whose undecodable canonical file was removed
    pub discarded: Vec<String>,
    /// Names left without a thumbnail because of a host failure; retried on
    /// the next sweep
    pub failed: Vec<String>,
    /// Thumbnails removed because their canonical file is gone
    pub orphaned_thumbnails: Vec<String>,
    /// Leftover temporary files removed
    pub temp_files_removed: usize,
}

impl ReconcileReport {
    /// True when the sweep found nothing to repair
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.regenerated.is_empty()
            && self.discarded.is_empty()
            && self.failed.is_empty()
            && self.orphaned_thumbnails.is_empty()
            && self.temp_files_removed == 0
    }
}
