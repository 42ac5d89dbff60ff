//! Ordered entry map shared by the in-memory and file-backed backends.

use std::collections::BTreeMap;
use std::ops::Bound;

use chrono::{DateTime, TimeDelta, Utc};
use chunkstash_types::{Key, KvValue, Versionstamp};

use crate::atomic::{AtomicBatch, AtomicOperation};
use crate::error::{KvError, KvResult};
use crate::selector::Selector;
use crate::traits::{KvEntry, KvLimits};
use crate::wal::{Mutation, SnapshotEntry};

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct StoredEntry {
    pub value: KvValue,
    pub versionstamp: Versionstamp,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug)]
pub(crate) struct KvState {
    entries: BTreeMap<Key, StoredEntry>,
    last: Versionstamp,
}

impl KvState {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            last: Versionstamp::ZERO,
        }
    }

    pub fn last_versionstamp(&self) -> Versionstamp {
        self.last
    }

    fn live(&self, key: &Key, now: DateTime<Utc>) -> Option<&StoredEntry> {
        self.entries.get(key).filter(|e| e.is_live(now))
    }

    pub fn get(&self, key: &Key, now: DateTime<Utc>) -> Option<KvEntry> {
        self.live(key, now).map(|e| KvEntry {
            key: key.clone(),
            value: e.value.clone(),
            versionstamp: e.versionstamp,
        })
    }

    pub fn list_page(
        &self,
        selector: &Selector,
        after: Option<&Key>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<KvEntry> {
        let lower = match after {
            Some(cursor) => Bound::Excluded(cursor.clone()),
            None => selector.lower_bound(),
        };
        self.entries
            .range::<Key, _>((lower, Bound::Unbounded))
            .take_while(|(k, _)| !selector.is_past_end(k))
            .filter(|(k, e)| selector.contains(k) && e.is_live(now))
            .take(limit)
            .map(|(k, e)| KvEntry {
                key: k.clone(),
                value: e.value.clone(),
                versionstamp: e.versionstamp,
            })
            .collect()
    }

    /// Reject batches that exceed the backend limits.
    pub fn validate(batch: &AtomicBatch, limits: &KvLimits) -> KvResult<()> {
        let mutations = batch.mutation_count();
        if !limits.allows_mutations(mutations) {
            return Err(KvError::TooManyMutations {
                count: mutations,
                max: limits.max_mutations.unwrap_or(usize::MAX),
            });
        }
        for op in batch.operations() {
            if let AtomicOperation::Set { key, value, .. } = op {
                let size = value.encoded_len();
                if size > limits.max_value_size {
                    return Err(KvError::ValueTooLarge {
                        key: key.to_string(),
                        size,
                        max: limits.max_value_size,
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns `true` if every `Check` of the batch holds right now.
    pub fn checks_pass(&self, batch: &AtomicBatch, now: DateTime<Utc>) -> bool {
        batch.operations().iter().all(|op| match op {
            AtomicOperation::Check { key, expected } => {
                self.live(key, now).map(|e| e.versionstamp) == *expected
            }
            _ => true,
        })
    }

    /// Turn the batch's mutations into absolute, replayable form.
    pub fn resolve(batch: AtomicBatch, now: DateTime<Utc>) -> Vec<Mutation> {
        batch
            .into_operations()
            .into_iter()
            .filter_map(|op| match op {
                AtomicOperation::Set {
                    key,
                    value,
                    expire_in,
                } => Some(Mutation::Set {
                    key,
                    value,
                    expires_at: expire_in.and_then(|ttl| {
                        TimeDelta::from_std(ttl)
                            .ok()
                            .and_then(|d| now.checked_add_signed(d))
                    }),
                }),
                AtomicOperation::Delete { key } => Some(Mutation::Delete { key }),
                AtomicOperation::Check { .. } => None,
            })
            .collect()
    }

    pub fn next_versionstamp(&self) -> Versionstamp {
        self.last.next()
    }

    pub fn apply(&mut self, stamp: Versionstamp, mutations: Vec<Mutation>) {
        for mutation in mutations {
            match mutation {
                Mutation::Set {
                    key,
                    value,
                    expires_at,
                } => {
                    self.entries.insert(
                        key,
                        StoredEntry {
                            value,
                            versionstamp: stamp,
                            expires_at,
                        },
                    );
                }
                Mutation::Delete { key } => {
                    self.entries.remove(&key);
                }
            }
        }
        self.last = self.last.max(stamp);
    }

    /// Drop entries whose TTL has elapsed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now));
        before - self.entries.len()
    }

    pub fn len(&self, now: DateTime<Utc>) -> usize {
        self.entries.values().filter(|e| e.is_live(now)).count()
    }

    pub fn total_bytes(&self, now: DateTime<Utc>) -> usize {
        self.entries
            .values()
            .filter(|e| e.is_live(now))
            .map(|e| e.value.encoded_len())
            .sum()
    }

    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        self.entries
            .iter()
            .map(|(k, e)| SnapshotEntry {
                key: k.clone(),
                value: e.value.clone(),
                versionstamp: e.versionstamp,
                expires_at: e.expires_at,
            })
            .collect()
    }

    pub fn restore(&mut self, last: Versionstamp, entries: Vec<SnapshotEntry>) {
        self.entries = entries
            .into_iter()
            .map(|e| {
                (
                    e.key,
                    StoredEntry {
                        value: e.value,
                        versionstamp: e.versionstamp,
                        expires_at: e.expires_at,
                    },
                )
            })
            .collect();
        self.last = last;
    }
}
