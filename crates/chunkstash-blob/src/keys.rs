//! Key enumeration helpers shared by the blob store and its callers.

use std::sync::Arc;

use chunkstash_kv::{collect_keys, KvBackend, Selector};
use chunkstash_types::{timing_safe_eq, Key, KeyPart};

use crate::error::{BlobError, BlobResult};

/// All keys matching `selector`, in ascending order.
pub async fn keys(
    backend: Arc<dyn KvBackend>,
    selector: Selector,
    batch_size: usize,
) -> BlobResult<Vec<Key>> {
    Ok(collect_keys(backend, selector, batch_size).await?)
}

/// The distinct keys exactly one part below `prefix`.
///
/// Given `[a, b]`, `[a, b, c]`, `[a, d, e]` and `[a, d, f]`, the unique
/// children of `[a]` are `[a, b]` and `[a, d]`. An empty prefix yields the
/// distinct root parts.
pub async fn unique(
    backend: Arc<dyn KvBackend>,
    prefix: &Key,
    batch_size: usize,
) -> BlobResult<Vec<Key>> {
    let listed = keys(backend, Selector::prefix(prefix.clone()), batch_size).await?;
    let depth = prefix.len();

    let mut parts: Vec<KeyPart> = Vec::new();
    for key in &listed {
        let part = key.get(depth).ok_or_else(|| BlobError::UnexpectedKeyLength {
            prefix: prefix.to_string(),
            len: key.len(),
        })?;
        add_if_unique(&mut parts, part);
    }

    Ok(parts.into_iter().map(|part| prefix.child(part)).collect())
}

/// Push `part` unless an equal part is already present. Binary parts are
/// compared byte-wise in constant time.
fn add_if_unique(parts: &mut Vec<KeyPart>, part: &KeyPart) {
    let present = match part {
        KeyPart::Bytes(bytes) => parts.iter().any(|p| match p {
            KeyPart::Bytes(existing) => timing_safe_eq(existing, bytes),
            _ => false,
        }),
        other => parts.iter().any(|p| p == other),
    };
    if !present {
        parts.push(part.clone());
    }
}
