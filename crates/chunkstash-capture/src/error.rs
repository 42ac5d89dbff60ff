use std::path::PathBuf;

use chunkstash_blob::BlobError;
use chunkstash_index::IndexError;

/// Errors from capture, dedup and reindex workflows.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// A single fetch of the source failed.
    #[error("fetch of {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    /// Every fetch attempt failed.
    #[error("unable to fetch {url} after {attempts} attempts: {reason}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        reason: String,
    },

    /// The source kept serving the artifact already stored as latest.
    #[error("no fresh content after {attempts} attempts")]
    Unchanged { attempts: u32 },

    /// A mirror path does not follow the `<date>/<time>.jpg` layout.
    #[error("invalid artifact path {}: {reason}", path.display())]
    InvalidArtifactPath { path: PathBuf, reason: String },

    /// A file listed by the mirror could not be found when read.
    #[error("artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The configuration cannot be used.
    #[error("invalid capture config: {0}")]
    InvalidConfig(String),

    /// I/O error from the mirror or workflow output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Result alias for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;
