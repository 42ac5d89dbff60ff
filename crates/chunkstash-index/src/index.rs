use std::sync::Arc;

use chrono::{DateTime, Utc};
use chunkstash_kv::{AtomicBatch, CommitOutcome, KvBackend};
use chunkstash_types::{ContentDigest, Key, KvValue};
use tracing::debug;

use crate::error::{IndexError, IndexResult};

/// Key part every index entry lives under.
pub const HASH_PREFIX: &str = "hash_to_date";

/// Digest → first-seen identity, first writer wins.
#[derive(Clone)]
pub struct ContentHashIndex {
    backend: Arc<dyn KvBackend>,
    prefix: Key,
}

impl ContentHashIndex {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend,
            prefix: Key::new(vec![HASH_PREFIX.into()]),
        }
    }

    /// Key of the entry for `digest`.
    pub fn entry_key(&self, digest: &ContentDigest) -> Key {
        self.prefix.child(*digest)
    }

    /// Record `identity` for `digest` unless an entry already exists.
    ///
    /// Returns `true` if this call created the entry. A lost race returns
    /// `false` and leaves the winner's identity in place.
    pub async fn insert_if_absent(
        &self,
        digest: &ContentDigest,
        identity: KvValue,
    ) -> IndexResult<bool> {
        let key = self.entry_key(digest);
        let mut batch = AtomicBatch::new();
        batch.check(key.clone(), None).set(key, identity);

        let won = match self.backend.commit(batch).await? {
            CommitOutcome::Committed(_) => true,
            CommitOutcome::Conflict => false,
        };
        debug!(digest = %digest.short_hex(), won, "hash index insert");
        Ok(won)
    }

    /// Identity recorded for `digest`, if any.
    pub async fn lookup(&self, digest: &ContentDigest) -> IndexResult<Option<KvValue>> {
        let entry = self.backend.get(&self.entry_key(digest)).await?;
        Ok(entry.map(|e| e.value))
    }

    /// Insert `identity` if absent, then return the identity that is
    /// recorded: `identity` itself on a win, the earlier winner's otherwise.
    pub async fn get_or_insert(
        &self,
        digest: &ContentDigest,
        identity: KvValue,
    ) -> IndexResult<KvValue> {
        if self.insert_if_absent(digest, identity.clone()).await? {
            return Ok(identity);
        }
        self.lookup(digest)
            .await?
            .ok_or(IndexError::Vanished(*digest))
    }

    /// First-seen timestamp for `digest`, if one is recorded.
    pub async fn first_seen(&self, digest: &ContentDigest) -> IndexResult<Option<DateTime<Utc>>> {
        Ok(self
            .lookup(digest)
            .await?
            .as_ref()
            .and_then(KvValue::as_timestamp))
    }
}
