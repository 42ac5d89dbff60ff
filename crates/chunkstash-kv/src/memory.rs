use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use chunkstash_types::{Key, Versionstamp};
use tracing::trace;

use crate::atomic::{AtomicBatch, CommitOutcome};
use crate::error::{KvError, KvResult};
use crate::selector::Selector;
use crate::state::KvState;
use crate::traits::{KvBackend, KvEntry, KvLimits};

/// In-memory, `BTreeMap`-based backend.
///
/// Intended for tests and embedding. State sits behind a `RwLock`; a commit
/// holds the write lock while it evaluates checks and applies mutations, so
/// commits are serialized and never observe each other half-done.
pub struct InMemoryKv {
    state: RwLock<KvState>,
    limits: KvLimits,
    closed: AtomicBool,
}

impl InMemoryKv {
    /// Create an empty store with default limits.
    pub fn new() -> Self {
        Self::with_limits(KvLimits::default())
    }

    pub fn with_limits(limits: KvLimits) -> Self {
        Self {
            state: RwLock::new(KvState::new()),
            limits,
            closed: AtomicBool::new(false),
        }
    }

    fn read(&self) -> KvResult<RwLockReadGuard<'_, KvState>> {
        self.ensure_open()?;
        self.state
            .read()
            .map_err(|e| KvError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> KvResult<RwLockWriteGuard<'_, KvState>> {
        self.ensure_open()?;
        self.state
            .write()
            .map_err(|e| KvError::LockPoisoned(e.to_string()))
    }

    fn ensure_open(&self) -> KvResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KvError::Closed);
        }
        Ok(())
    }

    /// Number of live entries.
    pub fn len(&self) -> KvResult<usize> {
        Ok(self.read()?.len(Utc::now()))
    }

    /// Returns `true` if no live entry is stored.
    pub fn is_empty(&self) -> KvResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Total encoded size of all live values.
    pub fn total_bytes(&self) -> KvResult<usize> {
        Ok(self.read()?.total_bytes(Utc::now()))
    }

    /// Stamp of the most recent successful commit.
    pub fn last_versionstamp(&self) -> KvResult<Versionstamp> {
        Ok(self.read()?.last_versionstamp())
    }

    /// Physically drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> KvResult<usize> {
        Ok(self.write()?.purge_expired(Utc::now()))
    }
}

impl Default for InMemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvBackend for InMemoryKv {
    async fn get(&self, key: &Key) -> KvResult<Option<KvEntry>> {
        Ok(self.read()?.get(key, Utc::now()))
    }

    async fn list_page(
        &self,
        selector: &Selector,
        after: Option<&Key>,
        limit: usize,
    ) -> KvResult<Vec<KvEntry>> {
        Ok(self.read()?.list_page(selector, after, limit, Utc::now()))
    }

    async fn commit(&self, batch: AtomicBatch) -> KvResult<CommitOutcome> {
        KvState::validate(&batch, &self.limits)?;

        let mut state = self.write()?;
        let now = Utc::now();
        if !state.checks_pass(&batch, now) {
            trace!(ops = batch.len(), "commit rejected by check");
            return Ok(CommitOutcome::Conflict);
        }

        let stamp = state.next_versionstamp();
        state.apply(stamp, KvState::resolve(batch, now));
        trace!(versionstamp = %stamp, "commit applied");
        Ok(CommitOutcome::Committed(stamp))
    }

    fn limits(&self) -> KvLimits {
        self.limits
    }

    async fn close(&self) -> KvResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::SetOptions;
    use chunkstash_types::{key, KvValue};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn set_get_delete() {
        let kv = InMemoryKv::new();
        let k = key!["a", 1i64];
        kv.set(&k, KvValue::from("one"), SetOptions::default())
            .await
            .unwrap();

        let entry = kv.get(&k).await.unwrap().unwrap();
        assert_eq!(entry.value, KvValue::from("one"));

        kv.delete(&k).await.unwrap();
        assert!(kv.get(&k).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn versionstamps_strictly_increase() {
        let kv = InMemoryKv::new();
        let a = kv.set(&key!["a"], 1i64.into(), SetOptions::default()).await.unwrap();
        let b = kv.set(&key!["b"], 2i64.into(), SetOptions::default()).await.unwrap();
        assert!(b > a);
        assert_eq!(kv.last_versionstamp().unwrap(), b);
    }

    #[tokio::test]
    async fn failed_check_applies_nothing() {
        let kv = InMemoryKv::new();
        kv.set(&key!["taken"], "x".into(), SetOptions::default())
            .await
            .unwrap();

        let mut batch = AtomicBatch::new();
        batch
            .check(key!["taken"], None)
            .set(key!["other"], "y")
            .delete(key!["taken"]);
        assert_eq!(kv.commit(batch).await.unwrap(), CommitOutcome::Conflict);

        assert!(kv.get(&key!["other"]).await.unwrap().is_none());
        assert!(kv.get(&key!["taken"]).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn limits_reject_before_checks() {
        let kv = InMemoryKv::with_limits(KvLimits {
            max_value_size: 8,
            max_mutations: Some(1),
        });
        let mut batch = AtomicBatch::new();
        batch.check(key!["k"], None).set(key!["k"], vec![0u8; 9]);
        assert!(matches!(
            kv.commit(batch).await,
            Err(KvError::ValueTooLarge { .. })
        ));

        let mut batch = AtomicBatch::new();
        batch.delete(key!["a"]).delete(key!["b"]);
        assert!(matches!(
            kv.commit(batch).await,
            Err(KvError::TooManyMutations { count: 2, max: 1 })
        ));
    }

    #[tokio::test]
    async fn ttl_entry_expires() {
        let kv = InMemoryKv::new();
        kv.set(
            &key!["ttl"],
            "v".into(),
            SetOptions::expire_in(Duration::from_millis(20)),
        )
        .await
        .unwrap();
        assert!(kv.get(&key!["ttl"]).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(kv.get(&key!["ttl"]).await.unwrap().is_none());
        assert_eq!(kv.purge_expired().unwrap(), 1);
    }

    #[tokio::test]
    async fn closed_backend_rejects_calls() {
        let kv = InMemoryKv::new();
        kv.close().await.unwrap();
        assert!(matches!(kv.get(&key!["a"]).await, Err(KvError::Closed)));
        assert!(matches!(
            kv.commit(AtomicBatch::new()).await,
            Err(KvError::Closed)
        ));
    }

    #[tokio::test]
    async fn concurrent_insert_if_absent_has_one_winner() {
        let kv = Arc::new(InMemoryKv::new());
        let mut handles = Vec::new();
        for i in 0..16i64 {
            let kv = Arc::clone(&kv);
            handles.push(tokio::spawn(async move {
                let mut batch = AtomicBatch::new();
                batch.check(key!["slot"], None).set(key!["slot"], i);
                kv.commit(batch).await.unwrap().is_committed()
            }));
        }

        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn stats_track_live_entries() {
        let kv = InMemoryKv::new();
        assert!(kv.is_empty().unwrap());
        kv.set(&key!["a"], vec![0u8; 10].into(), SetOptions::default())
            .await
            .unwrap();
        kv.set(&key!["b"], vec![0u8; 5].into(), SetOptions::default())
            .await
            .unwrap();
        assert_eq!(kv.len().unwrap(), 2);
        assert_eq!(kv.total_bytes().unwrap(), 15);
    }
}
