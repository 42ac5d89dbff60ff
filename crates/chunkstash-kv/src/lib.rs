//! Transactional key-value backend interface for chunkstash.
//!
//! The blob engine does not own storage: it drives a backend that offers
//! ordered listing and atomic, all-or-nothing batch commits guarded by
//! optimistic version checks. This crate defines that contract and ships two
//! backends.
//!
//! # Backends
//!
//! All backends implement the [`KvBackend`] trait:
//!
//! - [`InMemoryKv`] -- `BTreeMap`-based store for tests and embedding
//! - [`FileKv`] -- the same state made durable by a CRC-framed write-ahead log
//!
//! # Design Rules
//!
//! 1. A commit applies every operation of an [`AtomicBatch`] or none of them.
//! 2. A failed `Check` yields [`CommitOutcome::Conflict`], never an error.
//! 3. Every successful commit produces a strictly greater [`Versionstamp`].
//! 4. Listing is ordered by [`Key`](chunkstash_types::Key) and paged by cursor.
//! 5. Backend limits (value size, mutations per commit) reject a batch
//!    before any check is evaluated.
//! 6. The handle is explicitly owned; after `close()` every call fails with
//!    [`KvError::Closed`].
//!
//! [`Versionstamp`]: chunkstash_types::Versionstamp

pub mod atomic;
pub mod error;
pub mod file;
pub mod list;
pub mod memory;
pub mod selector;
pub mod traits;
pub mod wal;

mod state;

pub use atomic::{AtomicBatch, AtomicOperation, CommitOutcome, SetOptions};
pub use error::{KvError, KvResult};
pub use file::{FileKv, FileKvConfig};
pub use list::{collect_keys, list, KvStream};
pub use memory::InMemoryKv;
pub use selector::Selector;
pub use traits::{KvBackend, KvEntry, KvLimits};
pub use wal::{SyncMode, WalConfig};
