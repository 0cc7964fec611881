use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The primary error type for all operations in the `isoscope` crate.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The image file is missing, unreadable, or not recognized as ISO-9660.
    #[error("could not open image '{path}': {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    /// A full walk of the image found no entry with the requested path.
    /// Callers probing candidate paths treat this as "try the next one".
    #[error("no entry named '{0}' in image")]
    NotFound(String),

    /// The decoder yielded fewer bytes than the entry's declared size.
    #[error("entry '{path}' truncated: expected {expected} bytes, got {actual}")]
    TruncatedRead {
        path: String,
        expected: u64,
        actual: u64,
    },

    /// A disk-side failure while writing one entry during extraction.
    /// Non-fatal to the run; the engine logs it and moves on.
    #[error("write failed for '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The cooperative stop flag was observed. Always fatal to the run.
    #[error("extraction cancelled")]
    Cancelled,

    /// The background worker could not be launched. Distinct from any
    /// extraction-time error: no archive I/O has happened.
    #[error("could not start extraction worker: {0}")]
    StartFailed(#[source] io::Error),

    /// The on-disk ISO-9660 structure is not well formed.
    #[error("malformed ISO-9660 image: {0}")]
    Malformed(String),

    /// An underlying I/O error without a more specific classification.
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
