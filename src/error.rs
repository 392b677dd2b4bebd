//! Error types for the codeseal integrity-verification library.
//!
//! Every failure in the verification path is captured as a value and folded
//! into a check outcome; nothing here may terminate the host process.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for codeseal operations.
#[derive(Debug, Error)]
pub enum SealError {
    /// The running executable's own image was not found among the loaded set.
    /// Signals an abnormal loader state and is treated as an integrity
    /// failure, never silently skipped.
    #[error("own image not found among loaded modules")]
    ImageNotFound,

    /// The load-command walk exhausted every command without a match.
    #[error("section {section} not found in segment {segment}")]
    SectionNotFound { segment: String, section: String },

    /// A bounds violation while walking the load-command table.
    #[error("malformed image at offset {offset:#x}: {message}")]
    MalformedImage { offset: u64, message: String },

    /// The header declares a layout this walker does not implement
    /// (32-bit images are rejected, not assumed 64-bit).
    #[error("unsupported image format: magic {magic:#010x}")]
    UnsupportedFormat { magic: u32 },

    /// A reference-digest fetch reported failure.
    #[error("reference digest unavailable: {0}")]
    ReferenceUnavailable(String),

    /// The bundled provisioning manifest is absent.
    #[error("provisioning manifest missing: {path}")]
    ManifestMissing { path: PathBuf },

    /// The manifest exceeds the configured read cap.
    #[error("manifest too large: {size} bytes (limit {limit})")]
    ManifestTooLarge { size: u64, limit: u64 },

    /// Reference retrieval exceeded its time bound.
    #[error("reference retrieval timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for codeseal operations
pub type Result<T> = std::result::Result<T, SealError>;

impl SealError {
    /// Shorthand for a bounds-violation error during the walk.
    pub fn malformed(offset: usize, message: impl Into<String>) -> Self {
        SealError::MalformedImage {
            offset: offset as u64,
            message: message.into(),
        }
    }
}
