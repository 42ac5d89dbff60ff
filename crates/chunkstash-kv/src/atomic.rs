//! Atomic batches: ordered operation lists committed as one transaction.

use std::time::Duration;

use chunkstash_types::{Key, KvValue, Versionstamp};

use crate::error::KvResult;
use crate::traits::KvBackend;

/// Options accepted by a `Set` operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Time-to-live. The entry reads as absent once it has elapsed.
    pub expire_in: Option<Duration>,
}

impl SetOptions {
    pub fn expire_in(ttl: Duration) -> Self {
        Self {
            expire_in: Some(ttl),
        }
    }
}

/// One pending unit of an [`AtomicBatch`].
#[derive(Clone, Debug, PartialEq)]
pub enum AtomicOperation {
    /// Write `value` under `key`.
    Set {
        key: Key,
        value: KvValue,
        expire_in: Option<Duration>,
    },
    /// Remove `key`. Deleting an absent key is not an error.
    Delete { key: Key },
    /// Require `key` to currently carry `expected`; `None` requires absence.
    Check {
        key: Key,
        expected: Option<Versionstamp>,
    },
}

impl AtomicOperation {
    pub fn key(&self) -> &Key {
        match self {
            AtomicOperation::Set { key, .. }
            | AtomicOperation::Delete { key }
            | AtomicOperation::Check { key, .. } => key,
        }
    }

    /// Returns `true` for operations that change stored state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, AtomicOperation::Check { .. })
    }
}

/// Result of committing an [`AtomicBatch`].
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Every operation was applied; all written keys carry this stamp.
    Committed(Versionstamp),
    /// A check failed; nothing was applied.
    Conflict,
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed(_))
    }

    pub fn versionstamp(&self) -> Option<Versionstamp> {
        match self {
            CommitOutcome::Committed(v) => Some(*v),
            CommitOutcome::Conflict => None,
        }
    }
}

/// An ordered list of set/delete/check operations applied all-or-nothing.
///
/// Operations can be accumulated from several call sites before a single
/// commit. Within the commit they apply in insertion order, so a later `Set`
/// of the same key wins over an earlier one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AtomicBatch {
    ops: Vec<AtomicOperation>,
}

impl AtomicBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the commit conditional on `key` carrying `expected`.
    pub fn check(&mut self, key: Key, expected: Option<Versionstamp>) -> &mut Self {
        self.ops.push(AtomicOperation::Check { key, expected });
        self
    }

    pub fn set(&mut self, key: Key, value: impl Into<KvValue>) -> &mut Self {
        self.set_with(key, value, SetOptions::default())
    }

    pub fn set_with(
        &mut self,
        key: Key,
        value: impl Into<KvValue>,
        options: SetOptions,
    ) -> &mut Self {
        self.ops.push(AtomicOperation::Set {
            key,
            value: value.into(),
            expire_in: options.expire_in,
        });
        self
    }

    pub fn delete(&mut self, key: Key) -> &mut Self {
        self.ops.push(AtomicOperation::Delete { key });
        self
    }

    pub fn push(&mut self, op: AtomicOperation) -> &mut Self {
        self.ops.push(op);
        self
    }

    /// Append every operation of `other`, preserving order.
    pub fn extend(&mut self, other: AtomicBatch) -> &mut Self {
        self.ops.extend(other.ops);
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of set/delete operations (checks excluded).
    pub fn mutation_count(&self) -> usize {
        self.ops.iter().filter(|op| op.is_mutation()).count()
    }

    pub fn check_count(&self) -> usize {
        self.ops.len() - self.mutation_count()
    }

    pub fn operations(&self) -> &[AtomicOperation] {
        &self.ops
    }

    pub fn into_operations(self) -> Vec<AtomicOperation> {
        self.ops
    }

    /// Commit this batch against `backend`.
    pub async fn commit(self, backend: &dyn KvBackend) -> KvResult<CommitOutcome> {
        backend.commit(self).await
    }
}

impl FromIterator<AtomicOperation> for AtomicBatch {
    fn from_iter<I: IntoIterator<Item = AtomicOperation>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}
