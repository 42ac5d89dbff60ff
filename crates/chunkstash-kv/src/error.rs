use std::io;

/// Errors produced by key-value backends.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// The backend handle has been closed.
    #[error("kv backend is closed")]
    Closed,

    /// A value exceeds the backend's per-value size limit.
    #[error("value for key {key} is {size} bytes, limit is {max}")]
    ValueTooLarge { key: String, size: usize, max: usize },

    /// A batch carries more mutations than one commit may apply.
    #[error("batch has {count} mutations, limit is {max} per commit")]
    TooManyMutations { count: usize, max: usize },

    /// An unconditional write was reported as conflicting.
    #[error("unconditional commit reported a conflict")]
    UnexpectedConflict,

    /// A lock guarding backend state was poisoned by a panicking writer.
    #[error("backend lock poisoned: {0}")]
    LockPoisoned(String),

    /// I/O error during WAL or file operations.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the kv crate.
pub type KvResult<T> = Result<T, KvError>;
