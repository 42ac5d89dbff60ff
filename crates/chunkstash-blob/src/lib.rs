//! Chunked blob storage for chunkstash.
//!
//! A transactional key-value backend caps the size of a single value. The
//! [`BlobStore`] lifts that limit by splitting a value into fixed-size chunks
//! stored under `key ++ ["__BLOB__", i]` and writing them, together with the
//! deletion of chunks left over from a longer previous value, in one atomic
//! commit whenever the backend's mutation limit allows.
//!
//! # Guarantees
//!
//! - Reading the chunks in index order reproduces the value byte-for-byte.
//! - A successful `set` leaves no chunk beyond the new count.
//! - A `set` racing another writer of the same key fails with
//!   [`BlobError::TransactionConflict`] instead of mixing chunk generations.

pub mod config;
pub mod error;
pub mod keys;
pub mod store;

pub use config::{BlobConfig, RemoveMode, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE};
pub use error::{BlobError, BlobResult};
pub use store::{BlobStore, BlobStream, MARKER};
