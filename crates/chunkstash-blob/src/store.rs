use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use chunkstash_kv::{
    list, AtomicBatch, CommitOutcome, KvBackend, KvEntry, KvError, KvStream, Selector, SetOptions,
};
use chunkstash_types::{Key, KeyPart};
use futures::stream::{BoxStream, Stream, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use crate::config::{BlobConfig, RemoveMode};
use crate::error::{BlobError, BlobResult};
use crate::keys;

/// Reserved key part separating a blob key from its chunk indices.
pub const MARKER: &str = "__BLOB__";

/// Stream of chunk payloads, one item per stored chunk.
pub type BlobStream = BoxStream<'static, BlobResult<Bytes>>;

/// Stores values larger than the backend's entry limit as numbered chunks.
///
/// A blob under `key` lives at `key ++ [MARKER, i]` for `i` in `1..=N`.
/// Concatenating the chunks in index order reproduces the value.
#[derive(Clone)]
pub struct BlobStore {
    backend: Arc<dyn KvBackend>,
    config: BlobConfig,
    prefix: Key,
}

impl BlobStore {
    /// Create a store over `backend`, rejecting configurations the backend
    /// cannot hold.
    pub fn new(backend: Arc<dyn KvBackend>, config: BlobConfig) -> BlobResult<Self> {
        if config.chunk_size == 0 {
            return Err(BlobError::InvalidConfig("chunk_size must be positive".into()));
        }
        if config.batch_size == 0 {
            return Err(BlobError::InvalidConfig("batch_size must be positive".into()));
        }
        let max = backend.limits().max_value_size;
        if config.chunk_size >= max {
            return Err(BlobError::InvalidConfig(format!(
                "chunk_size {} must be below the backend value limit {max}",
                config.chunk_size
            )));
        }
        Ok(Self {
            backend,
            config,
            prefix: Key::empty(),
        })
    }

    /// Nest every key this store touches under `prefix`.
    pub fn with_prefix(mut self, prefix: Key) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn config(&self) -> &BlobConfig {
        &self.config
    }

    pub fn prefix(&self) -> &Key {
        &self.prefix
    }

    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    fn full_key(&self, key: &Key) -> Key {
        self.prefix.join(key)
    }

    fn chunk_prefix(&self, key: &Key) -> Key {
        self.full_key(key).child(MARKER)
    }

    fn strip(&self, key: Key) -> Key {
        key.strip_prefix(&self.prefix).unwrap_or(key)
    }

    async fn observed_chunks(&self, chunk_prefix: &Key) -> BlobResult<Vec<KvEntry>> {
        let entries = list(
            Arc::clone(&self.backend),
            Selector::prefix(chunk_prefix.clone()),
            self.config.batch_size,
        )
        .try_collect()
        .await?;
        Ok(entries)
    }

    /// Store `data` under `key`, replacing any previous value.
    ///
    /// An empty `data` stores no chunks, so a later `get` reports `None`.
    pub async fn set(&self, key: &Key, data: &[u8], options: SetOptions) -> BlobResult<()> {
        let chunks = data
            .chunks(self.config.chunk_size)
            .map(|c| c.to_vec())
            .collect();
        self.write_chunks(key, chunks, options).await
    }

    /// Store the bytes of `stream` under `key`.
    ///
    /// Pieces of any size are re-chunked so every chunk except the last is
    /// exactly `chunk_size` bytes.
    pub async fn set_stream<S>(&self, key: &Key, stream: S, options: SetOptions) -> BlobResult<()>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send,
    {
        let size = self.config.chunk_size;
        let mut stream = std::pin::pin!(stream);
        let mut pending = BytesMut::new();
        let mut chunks = Vec::new();

        while let Some(piece) = stream.next().await {
            pending.extend_from_slice(&piece?);
            while pending.len() >= size {
                chunks.push(pending.split_to(size).to_vec());
            }
        }
        if !pending.is_empty() {
            chunks.push(pending.to_vec());
        }

        self.write_chunks(key, chunks, options).await
    }

    async fn write_chunks(
        &self,
        key: &Key,
        chunks: Vec<Vec<u8>>,
        options: SetOptions,
    ) -> BlobResult<()> {
        let chunk_prefix = self.chunk_prefix(key);
        let observed = self.observed_chunks(&chunk_prefix).await?;
        let count = chunks.len();

        // The first commit only goes through if the chunk set is still the
        // one observed above.
        let mut guard = AtomicBatch::new();
        for entry in &observed {
            guard.check(entry.key.clone(), Some(entry.versionstamp));
        }
        guard.check(chunk_prefix.child((observed.len() + 1) as i64), None);

        let mut sets = Vec::with_capacity(count);
        for (i, chunk) in chunks.into_iter().enumerate() {
            sets.push((chunk_prefix.child((i + 1) as i64), chunk));
        }

        let stale: Vec<Key> = observed
            .into_iter()
            .map(|entry| entry.key)
            .filter(|k| !is_within_count(k, count))
            .collect();

        let plan = plan_commits(
            guard,
            sets,
            stale,
            options,
            self.backend.limits().max_mutations,
            self.config.batch_size,
        );
        let commits = plan.len();

        for (n, batch) in plan.into_iter().enumerate() {
            match self.backend.commit(batch).await? {
                CommitOutcome::Committed(stamp) => {
                    debug!(key = %key, commit = n + 1, commits, versionstamp = %stamp, "blob commit");
                }
                CommitOutcome::Conflict => {
                    if n > 0 {
                        warn!(key = %key, commit = n + 1, "blob write conflicted after first commit");
                    }
                    return Err(BlobError::TransactionConflict {
                        key: key.to_string(),
                    });
                }
            }
        }

        debug!(key = %key, chunks = count, commits, "blob set");
        Ok(())
    }

    /// Read the whole blob, or `None` if no chunks are stored.
    pub async fn get(&self, key: &Key) -> BlobResult<Option<Vec<u8>>> {
        let mut segments = self.get_stream(key);
        let mut out: Option<Vec<u8>> = None;
        while let Some(segment) = segments.next().await {
            out.get_or_insert_with(Vec::new)
                .extend_from_slice(&segment?);
        }
        Ok(out)
    }

    /// Read the blob lazily, one segment per chunk.
    ///
    /// Chunks are fetched `batch_size` at a time as the stream is polled.
    /// The stream is single-pass; call again to re-read.
    pub fn get_stream(&self, key: &Key) -> BlobStream {
        let entries: KvStream = list(
            Arc::clone(&self.backend),
            Selector::prefix(self.chunk_prefix(key)),
            self.config.batch_size,
        );
        entries
            .map(|entry| {
                let entry = entry?;
                chunk_payload(entry)
            })
            .boxed()
    }

    /// Delete every chunk of the blob. Returns how many chunks were removed.
    pub async fn remove(&self, key: &Key) -> BlobResult<usize> {
        let chunk_keys = keys::keys(
            Arc::clone(&self.backend),
            Selector::prefix(self.chunk_prefix(key)),
            self.config.batch_size,
        )
        .await?;
        let total = chunk_keys.len();
        if total == 0 {
            return Ok(0);
        }

        let groups: Vec<Vec<Key>> =
            if total <= self.config.batch_size || self.config.remove_mode == RemoveMode::SingleCommit
            {
                vec![chunk_keys]
            } else {
                chunk_keys
                    .chunks(self.config.batch_size)
                    .map(<[Key]>::to_vec)
                    .collect()
            };

        for group in groups {
            let mut batch = AtomicBatch::new();
            for k in group {
                batch.delete(k);
            }
            if let CommitOutcome::Conflict = self.backend.commit(batch).await? {
                return Err(BlobError::Kv(KvError::UnexpectedConflict));
            }
        }

        debug!(key = %key, chunks = total, "blob removed");
        Ok(total)
    }

    /// Returns `true` if a blob is stored under `key`.
    pub async fn exists(&self, key: &Key) -> BlobResult<bool> {
        let first = self.chunk_prefix(key).child(1i64);
        Ok(self.backend.get(&first).await?.is_some())
    }

    /// Raw keys matching `selector`, relative to this store's prefix.
    pub async fn keys(&self, selector: &Selector) -> BlobResult<Vec<Key>> {
        let selector = selector.map_keys(|k| self.full_key(k));
        let listed = keys::keys(Arc::clone(&self.backend), selector, self.config.batch_size).await?;
        Ok(listed.into_iter().map(|k| self.strip(k)).collect())
    }

    /// Distinct keys one level below `prefix`, relative to this store's prefix.
    pub async fn unique(&self, prefix: &Key) -> BlobResult<Vec<Key>> {
        let listed = keys::unique(
            Arc::clone(&self.backend),
            &self.full_key(prefix),
            self.config.batch_size,
        )
        .await?;
        Ok(listed.into_iter().map(|k| self.strip(k)).collect())
    }

    /// Keys of the blobs stored below `prefix`.
    pub async fn blob_keys(&self, prefix: &Key) -> BlobResult<Vec<Key>> {
        let listed = self.keys(&Selector::prefix(prefix.clone())).await?;
        Ok(listed
            .into_iter()
            .filter(|k| is_first_chunk(k))
            .map(|k| k.truncated(k.len() - 2))
            .collect())
    }
}

fn chunk_payload(entry: KvEntry) -> BlobResult<Bytes> {
    let kind = entry.value.kind();
    entry
        .value
        .into_bytes()
        .map(Bytes::from)
        .map_err(|_| BlobError::MalformedStoredValue {
            key: entry.key.to_string(),
            kind,
        })
}

fn chunk_index(key: &Key) -> Option<i64> {
    key.last().and_then(KeyPart::as_int)
}

fn is_within_count(key: &Key, count: usize) -> bool {
    matches!(chunk_index(key), Some(i) if i >= 1 && (i as u64) <= count as u64)
}

fn is_first_chunk(key: &Key) -> bool {
    key.len() >= 2
        && key.get(key.len() - 2).and_then(KeyPart::as_str) == Some(MARKER)
        && chunk_index(key) == Some(1)
}

/// Split a blob write into commits the backend accepts.
///
/// Everything goes into one commit when it fits the mutation limit.
/// Otherwise chunk writes are spread over commits of at most `max` sets,
/// the first of which carries the guard checks, and stale chunks are
/// deleted afterwards in commits of at most `batch_size` deletes.
fn plan_commits(
    guard: AtomicBatch,
    sets: Vec<(Key, Vec<u8>)>,
    stale: Vec<Key>,
    options: SetOptions,
    max_mutations: Option<usize>,
    batch_size: usize,
) -> Vec<AtomicBatch> {
    let total = sets.len() + stale.len();
    let max = match max_mutations {
        Some(max) if total > max => max.max(1),
        _ => {
            let mut batch = guard;
            for (k, chunk) in sets {
                batch.set_with(k, chunk, options);
            }
            for k in stale {
                batch.delete(k);
            }
            return vec![batch];
        }
    };

    let mut plan = Vec::new();
    let mut current = guard;
    let mut in_current = 0;
    for (k, chunk) in sets {
        if in_current == max {
            plan.push(std::mem::take(&mut current));
            in_current = 0;
        }
        current.set_with(k, chunk, options);
        in_current += 1;
    }
    if !current.is_empty() {
        plan.push(current);
    }

    for group in stale.chunks(batch_size.min(max).max(1)) {
        let mut batch = AtomicBatch::new();
        for k in group {
            batch.delete(k.clone());
        }
        plan.push(batch);
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkstash_kv::{InMemoryKv, KvLimits};
    use chunkstash_types::{key, KvValue};
    use proptest::prelude::*;

    const C: usize = 16;

    fn backend() -> Arc<InMemoryKv> {
        Arc::new(InMemoryKv::with_limits(KvLimits {
            max_value_size: 64,
            max_mutations: Some(1000),
        }))
    }

    fn store_over(kv: Arc<InMemoryKv>, config: BlobConfig) -> BlobStore {
        BlobStore::new(kv, config).unwrap()
    }

    fn small_config() -> BlobConfig {
        BlobConfig {
            chunk_size: C,
            batch_size: 3,
            remove_mode: RemoveMode::SubBatches,
        }
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    async fn chunk_count(store: &BlobStore, key: &Key) -> usize {
        store
            .keys(&Selector::prefix(key.child(MARKER)))
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn round_trip_boundary_lengths() {
        let store = store_over(backend(), small_config());
        for len in [1, C - 1, C, C + 1, 10 * C] {
            let k = key!["blob", len as i64];
            let data = payload(len);
            store.set(&k, &data, SetOptions::default()).await.unwrap();
            assert_eq!(store.get(&k).await.unwrap().unwrap(), data, "len {len}");
            assert_eq!(chunk_count(&store, &k).await, len.div_ceil(C));
        }
    }

    #[tokio::test]
    async fn empty_value_stores_nothing() {
        let store = store_over(backend(), small_config());
        let k = key!["empty"];
        store.set(&k, &[], SetOptions::default()).await.unwrap();
        assert!(store.get(&k).await.unwrap().is_none());
        assert!(!store.exists(&k).await.unwrap());
    }

    #[tokio::test]
    async fn shrinking_overwrite_deletes_stale_chunks() {
        let store = store_over(backend(), small_config());
        let k = key!["shrink"];
        store.set(&k, &payload(10 * C), SetOptions::default()).await.unwrap();
        let smaller = payload(2 * C + 3);
        store.set(&k, &smaller, SetOptions::default()).await.unwrap();

        assert_eq!(chunk_count(&store, &k).await, 3);
        assert_eq!(store.get(&k).await.unwrap().unwrap(), smaller);
    }

    #[tokio::test]
    async fn shrinking_overwrite_under_tight_mutation_limit() {
        let kv = Arc::new(InMemoryKv::with_limits(KvLimits {
            max_value_size: 64,
            max_mutations: Some(4),
        }));
        let store = store_over(kv, small_config());
        let k = key!["tight"];
        store.set(&k, &payload(10 * C), SetOptions::default()).await.unwrap();
        assert_eq!(chunk_count(&store, &k).await, 10);

        let smaller = payload(C + 1);
        store.set(&k, &smaller, SetOptions::default()).await.unwrap();
        assert_eq!(chunk_count(&store, &k).await, 2);
        assert_eq!(store.get(&k).await.unwrap().unwrap(), smaller);
    }

    #[tokio::test]
    async fn remove_then_get_is_none() {
        let store = store_over(backend(), small_config());
        let k = key!["gone"];
        store.set(&k, &payload(7 * C), SetOptions::default()).await.unwrap();

        assert_eq!(store.remove(&k).await.unwrap(), 7);
        assert!(store.get(&k).await.unwrap().is_none());
        assert_eq!(chunk_count(&store, &k).await, 0);
        assert_eq!(store.remove(&k).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn single_commit_remove_is_rejected_by_small_limit() {
        let kv = Arc::new(InMemoryKv::with_limits(KvLimits {
            max_value_size: 64,
            max_mutations: Some(4),
        }));
        let config = BlobConfig {
            remove_mode: RemoveMode::SingleCommit,
            ..small_config()
        };
        let store = store_over(kv, config);
        let k = key!["big"];
        store.set(&k, &payload(6 * C), SetOptions::default()).await.unwrap();

        assert!(matches!(
            store.remove(&k).await,
            Err(BlobError::Kv(KvError::TooManyMutations { count: 6, max: 4 }))
        ));
        assert!(store.exists(&k).await.unwrap());
    }

    #[tokio::test]
    async fn stream_yields_one_segment_per_chunk() {
        let store = store_over(backend(), small_config());
        let k = key!["stream"];
        let data = payload(4 * C + 5);
        store.set(&k, &data, SetOptions::default()).await.unwrap();

        let segments: Vec<Bytes> = store.get_stream(&k).try_collect().await.unwrap();
        assert_eq!(segments.len(), 5);
        assert!(segments[..4].iter().all(|s| s.len() == C));
        assert_eq!(segments.concat(), store.get(&k).await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn set_stream_rechunks_arbitrary_pieces() {
        let store = store_over(backend(), small_config());
        let k = key!["pieces"];
        let data = payload(3 * C + 2);
        let pieces: Vec<std::io::Result<Bytes>> = data
            .chunks(5)
            .map(|p| Ok(Bytes::copy_from_slice(p)))
            .collect();

        store
            .set_stream(&k, futures::stream::iter(pieces), SetOptions::default())
            .await
            .unwrap();

        let segments: Vec<Bytes> = store.get_stream(&k).try_collect().await.unwrap();
        let lens: Vec<usize> = segments.iter().map(Bytes::len).collect();
        assert_eq!(lens, vec![C, C, C, 2]);
        assert_eq!(segments.concat(), data);
    }

    #[tokio::test]
    async fn set_stream_propagates_source_errors() {
        let store = store_over(backend(), small_config());
        let k = key!["broken"];
        let pieces: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(std::io::Error::other("disk gone")),
        ];
        let result = store
            .set_stream(&k, futures::stream::iter(pieces), SetOptions::default())
            .await;
        assert!(matches!(result, Err(BlobError::Source(_))));
        assert!(!store.exists(&k).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_chunk_change_is_a_conflict() {
        let kv = backend();
        let store = store_over(Arc::clone(&kv), small_config());
        let k = key!["race"];
        store.set(&k, &payload(2 * C), SetOptions::default()).await.unwrap();

        let mut guard = AtomicBatch::new();
        let observed = store.keys(&Selector::prefix(k.child(MARKER))).await.unwrap();
        for ck in &observed {
            let entry = kv.get(ck).await.unwrap().unwrap();
            guard.check(ck.clone(), Some(entry.versionstamp));
        }

        // Another writer appends a chunk after the observation.
        kv.set(&k.child(MARKER).child(3i64), vec![0u8; 4].into(), SetOptions::default())
            .await
            .unwrap();
        assert_eq!(
            kv.commit(guard).await.unwrap(),
            CommitOutcome::Conflict,
            "stale observation must not commit"
        );

        // The store itself re-observes and succeeds.
        let data = payload(C);
        store.set(&k, &data, SetOptions::default()).await.unwrap();
        assert_eq!(store.get(&k).await.unwrap().unwrap(), data);
        assert_eq!(chunk_count(&store, &k).await, 1);
    }

    /// Lets another writer touch `key` right after the first listing.
    struct Interleaved {
        inner: Arc<InMemoryKv>,
        key: Key,
        value: KvValue,
        fired: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl KvBackend for Interleaved {
        async fn get(&self, key: &Key) -> chunkstash_kv::KvResult<Option<KvEntry>> {
            self.inner.get(key).await
        }

        async fn list_page(
            &self,
            selector: &Selector,
            after: Option<&Key>,
            limit: usize,
        ) -> chunkstash_kv::KvResult<Vec<KvEntry>> {
            let page = self.inner.list_page(selector, after, limit).await?;
            if !self.fired.swap(true, std::sync::atomic::Ordering::SeqCst) {
                self.inner
                    .set(&self.key, self.value.clone(), SetOptions::default())
                    .await?;
            }
            Ok(page)
        }

        async fn commit(&self, batch: AtomicBatch) -> chunkstash_kv::KvResult<CommitOutcome> {
            self.inner.commit(batch).await
        }

        fn limits(&self) -> KvLimits {
            self.inner.limits()
        }

        async fn close(&self) -> chunkstash_kv::KvResult<()> {
            self.inner.close().await
        }
    }

    async fn set_racing(inject: Key) -> (Arc<InMemoryKv>, BlobResult<()>) {
        let kv = backend();
        let plain = store_over(Arc::clone(&kv), small_config());
        let k = key!["race"];
        plain.set(&k, &payload(2 * C), SetOptions::default()).await.unwrap();

        let racing = Arc::new(Interleaved {
            inner: Arc::clone(&kv),
            key: inject,
            value: KvValue::Bytes(vec![0xEE; 4]),
            fired: std::sync::atomic::AtomicBool::new(false),
        });
        let store = BlobStore::new(racing, small_config()).unwrap();
        let result = store.set(&k, &payload(C), SetOptions::default()).await;
        (kv, result)
    }

    #[tokio::test]
    async fn set_conflicts_when_a_chunk_is_appended_meanwhile() {
        let k = key!["race"];
        let (kv, result) = set_racing(k.child(MARKER).child(3i64)).await;
        assert!(matches!(
            result,
            Err(BlobError::TransactionConflict { ref key }) if key == "race"
        ));

        // Nothing from the losing write landed.
        let plain = store_over(kv, small_config());
        assert_eq!(chunk_count(&plain, &k).await, 3);
        let stored = plain.get(&k).await.unwrap().unwrap();
        assert_eq!(&stored[..2 * C], &payload(2 * C)[..]);
        assert_eq!(&stored[2 * C..], &[0xEE; 4]);
    }

    #[tokio::test]
    async fn set_conflicts_when_a_chunk_is_rewritten_meanwhile() {
        let k = key!["race"];
        let (kv, result) = set_racing(k.child(MARKER).child(2i64)).await;
        assert!(matches!(result, Err(BlobError::TransactionConflict { .. })));

        let plain = store_over(kv, small_config());
        assert_eq!(chunk_count(&plain, &k).await, 2);
        let stored = plain.get(&k).await.unwrap().unwrap();
        assert_eq!(&stored[..C], &payload(2 * C)[..C]);
        assert_eq!(&stored[C..], &[0xEE; 4]);
    }

    #[tokio::test]
    async fn malformed_chunk_fails_read() {
        let kv = backend();
        let store = store_over(Arc::clone(&kv), small_config());
        let k = key!["bad"];
        kv.set(&k.child(MARKER).child(1i64), KvValue::from("text"), SetOptions::default())
            .await
            .unwrap();
        assert!(matches!(
            store.get(&k).await,
            Err(BlobError::MalformedStoredValue { kind: "string", .. })
        ));
    }

    #[tokio::test]
    async fn prefix_namespaces_every_operation() {
        let kv = backend();
        let plain = store_over(Arc::clone(&kv), small_config());
        let spaced = store_over(Arc::clone(&kv), small_config()).with_prefix(key!["ns"]);
        let k = key!["images", "2024-01-01", "12_00_00"];

        spaced.set(&k, &payload(C + 1), SetOptions::default()).await.unwrap();
        assert!(plain.get(&k).await.unwrap().is_none());
        assert!(plain.exists(&key!["ns"].join(&k)).await.unwrap());

        assert_eq!(spaced.unique(&key!["images"]).await.unwrap(), vec![key!["images", "2024-01-01"]]);
        assert_eq!(spaced.blob_keys(&key!["images"]).await.unwrap(), vec![k.clone()]);

        spaced.remove(&k).await.unwrap();
        assert!(plain.keys(&Selector::prefix(key!["ns"])).await.unwrap().is_empty());
    }

    #[test]
    fn construction_rejects_oversized_chunks() {
        let kv = backend();
        let config = BlobConfig {
            chunk_size: 64,
            ..small_config()
        };
        assert!(matches!(
            BlobStore::new(kv, config),
            Err(BlobError::InvalidConfig(_))
        ));
    }

    #[test]
    fn plan_splits_when_over_limit() {
        let chunk_prefix = key!["k", MARKER];
        let mut guard = AtomicBatch::new();
        guard.check(chunk_prefix.child(1i64), None);
        let sets = (1..=5i64)
            .map(|i| (chunk_prefix.child(i), vec![0u8]))
            .collect();
        let stale = (6..=12i64).map(|i| chunk_prefix.child(i)).collect();

        let plan = plan_commits(guard, sets, stale, SetOptions::default(), Some(3), 2);
        let shapes: Vec<(usize, usize)> = plan
            .iter()
            .map(|b| (b.check_count(), b.mutation_count()))
            .collect();
        assert_eq!(shapes, vec![(1, 3), (0, 2), (0, 2), (0, 2), (0, 2), (0, 1)]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn any_payload_round_trips(data in proptest::collection::vec(any::<u8>(), 1..(6 * C))) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let got = rt.block_on(async {
                let store = store_over(backend(), small_config());
                let k = key!["p"];
                store.set(&k, &data, SetOptions::default()).await.unwrap();
                store.get(&k).await.unwrap().unwrap()
            });
            prop_assert_eq!(got, data);
        }
    }
}
