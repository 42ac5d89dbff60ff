//! Content-hash index for chunkstash.
//!
//! Maps a [`ContentDigest`](chunkstash_types::ContentDigest) to the canonical
//! identity of the first artifact seen with that content (its capture
//! timestamp). Entries are created once through an optimistic
//! insert-if-absent commit and are never overwritten, so concurrent writers
//! agree on a single winner without locks.

pub mod error;
pub mod index;

pub use error::{IndexError, IndexResult};
pub use index::{ContentHashIndex, HASH_PREFIX};
