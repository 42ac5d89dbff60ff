//! Lazily paged listing over any [`KvBackend`].

use std::collections::VecDeque;
use std::sync::Arc;

use chunkstash_types::Key;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::error::KvResult;
use crate::selector::Selector;
use crate::traits::{KvBackend, KvEntry};

/// Stream of listed entries in ascending key order.
pub type KvStream = BoxStream<'static, KvResult<KvEntry>>;

struct Cursor {
    backend: Arc<dyn KvBackend>,
    selector: Selector,
    batch_size: usize,
    after: Option<Key>,
    buffered: VecDeque<KvEntry>,
    exhausted: bool,
}

/// List every entry matching `selector`, fetching `batch_size` entries per
/// backend round trip.
///
/// Pages are pulled only as the stream is polled. A page shorter than
/// `batch_size` ends the listing.
pub fn list(backend: Arc<dyn KvBackend>, selector: Selector, batch_size: usize) -> KvStream {
    let cursor = Cursor {
        backend,
        selector,
        batch_size: batch_size.max(1),
        after: None,
        buffered: VecDeque::new(),
        exhausted: false,
    };

    stream::try_unfold(cursor, next_entry).boxed()
}

async fn next_entry(mut cursor: Cursor) -> KvResult<Option<(KvEntry, Cursor)>> {
    loop {
        if let Some(entry) = cursor.buffered.pop_front() {
            return Ok(Some((entry, cursor)));
        }
        if cursor.exhausted {
            return Ok(None);
        }

        let page = cursor
            .backend
            .list_page(&cursor.selector, cursor.after.as_ref(), cursor.batch_size)
            .await?;
        cursor.exhausted = page.len() < cursor.batch_size;
        if let Some(last) = page.last() {
            cursor.after = Some(last.key.clone());
        }
        cursor.buffered.extend(page);
    }
}

/// Collect the keys of every entry matching `selector`.
pub async fn collect_keys(
    backend: Arc<dyn KvBackend>,
    selector: Selector,
    batch_size: usize,
) -> KvResult<Vec<Key>> {
    list(backend, selector, batch_size)
        .map_ok(|entry| entry.key)
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::AtomicBatch;
    use crate::memory::InMemoryKv;
    use chunkstash_types::key;

    async fn seeded(n: i64) -> Arc<dyn KvBackend> {
        let kv = Arc::new(InMemoryKv::new());
        let mut batch = AtomicBatch::new();
        for i in 1..=n {
            batch.set(key!["p", i], i);
        }
        batch.set(key!["p"], "prefix itself");
        batch.set(key!["q", 1i64], "outside");
        assert!(kv.commit(batch).await.unwrap().is_committed());
        kv
    }

    #[tokio::test]
    async fn pages_through_all_entries_in_order() {
        let kv = seeded(23).await;
        let keys = collect_keys(kv, Selector::prefix(key!["p"]), 5)
            .await
            .unwrap();
        let idx: Vec<i64> = keys
            .iter()
            .map(|k| k.last().and_then(|p| p.as_int()).unwrap())
            .collect();
        assert_eq!(idx, (1..=23).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn exact_multiple_of_batch_size() {
        let kv = seeded(10).await;
        let keys = collect_keys(kv, Selector::prefix(key!["p"]), 5)
            .await
            .unwrap();
        assert_eq!(keys.len(), 10);
    }

    #[tokio::test]
    async fn empty_selection_yields_nothing() {
        let kv = seeded(3).await;
        let keys = collect_keys(kv, Selector::prefix(key!["none"]), 5)
            .await
            .unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn stream_can_stop_early() {
        let kv = seeded(50).await;
        let first: Vec<_> = list(kv, Selector::prefix(key!["p"]), 4)
            .take(3)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first[2].key, key!["p", 3i64]);
    }
}
