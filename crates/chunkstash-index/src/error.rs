use chunkstash_kv::KvError;
use chunkstash_types::ContentDigest;

/// Errors from content-hash index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Insert-if-absent lost, yet the winning entry could not be read back
    /// (it expired or was deleted in between).
    #[error("index entry for {0} vanished after a lost insert")]
    Vanished(ContentDigest),

    /// Error from the underlying key-value backend.
    #[error(transparent)]
    Kv(#[from] KvError),
}

/// Result alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
