use async_trait::async_trait;
use chunkstash_types::{Key, KvValue, Versionstamp};

use crate::atomic::{AtomicBatch, CommitOutcome, SetOptions};
use crate::error::{KvError, KvResult};
use crate::selector::Selector;

/// A stored entry as returned by reads and listings.
#[derive(Clone, Debug, PartialEq)]
pub struct KvEntry {
    pub key: Key,
    pub value: KvValue,
    /// Stamp of the commit that last wrote this key.
    pub versionstamp: Versionstamp,
}

/// Hard limits a backend enforces on every commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KvLimits {
    /// Largest single value, in bytes.
    pub max_value_size: usize,
    /// Most set/delete operations one commit may carry. `None` is unbounded.
    pub max_mutations: Option<usize>,
}

impl KvLimits {
    pub const fn unbounded() -> Self {
        Self {
            max_value_size: usize::MAX,
            max_mutations: None,
        }
    }

    /// Returns `true` if a commit with `count` mutations is accepted.
    pub fn allows_mutations(&self, count: usize) -> bool {
        self.max_mutations.map_or(true, |max| count <= max)
    }
}

impl Default for KvLimits {
    fn default() -> Self {
        Self {
            max_value_size: 64 * 1024,
            max_mutations: Some(1000),
        }
    }
}

/// Transactional key-value backend.
///
/// All implementations must satisfy these invariants:
/// - `commit` is all-or-nothing. A failed check returns
///   `Ok(CommitOutcome::Conflict)` and leaves state untouched.
/// - Versionstamps of successful commits strictly increase.
/// - `list_page` returns entries in ascending key order, strictly after the
///   cursor when one is given.
/// - Expired entries are invisible to `get`, `list_page` and checks.
/// - I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Read one entry. Returns `Ok(None)` if the key is absent.
    async fn get(&self, key: &Key) -> KvResult<Option<KvEntry>>;

    /// Read up to `limit` entries matching `selector`, strictly after `after`.
    ///
    /// A page shorter than `limit` means the listing is exhausted.
    async fn list_page(
        &self,
        selector: &Selector,
        after: Option<&Key>,
        limit: usize,
    ) -> KvResult<Vec<KvEntry>>;

    /// Apply `batch` atomically.
    async fn commit(&self, batch: AtomicBatch) -> KvResult<CommitOutcome>;

    /// Limits enforced by `commit`.
    fn limits(&self) -> KvLimits;

    /// Flush and release the backend. Later calls fail with
    /// [`KvError::Closed`].
    async fn close(&self) -> KvResult<()>;

    /// Unconditionally write one entry.
    async fn set(&self, key: &Key, value: KvValue, options: SetOptions) -> KvResult<Versionstamp> {
        let mut batch = AtomicBatch::new();
        batch.set_with(key.clone(), value, options);
        match self.commit(batch).await? {
            CommitOutcome::Committed(stamp) => Ok(stamp),
            CommitOutcome::Conflict => Err(KvError::UnexpectedConflict),
        }
    }

    /// Unconditionally delete one entry.
    async fn delete(&self, key: &Key) -> KvResult<()> {
        let mut batch = AtomicBatch::new();
        batch.delete(key.clone());
        match self.commit(batch).await? {
            CommitOutcome::Committed(_) => Ok(()),
            CommitOutcome::Conflict => Err(KvError::UnexpectedConflict),
        }
    }
}
