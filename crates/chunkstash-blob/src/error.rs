use chunkstash_kv::KvError;

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// A commit was rejected because the chunk set changed underneath it.
    #[error("transaction conflict while writing blob {key}")]
    TransactionConflict { key: String },

    /// A chunk entry holds something other than bytes.
    #[error("chunk {key} holds a {kind} value, expected bytes")]
    MalformedStoredValue { key: String, kind: &'static str },

    /// A listed key is not longer than the prefix it was listed under.
    #[error("unexpected key length {len} under prefix {prefix}")]
    UnexpectedKeyLength { prefix: String, len: usize },

    /// The configuration cannot work against the backend.
    #[error("invalid blob config: {0}")]
    InvalidConfig(String),

    /// A byte stream fed to `set_stream` failed.
    #[error("source stream error: {0}")]
    Source(#[from] std::io::Error),

    /// Error from the underlying key-value backend.
    #[error(transparent)]
    Kv(#[from] KvError),
}

/// Result alias for blob operations.
pub type BlobResult<T> = Result<T, BlobError>;
