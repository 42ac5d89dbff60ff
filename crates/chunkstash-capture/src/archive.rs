use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chunkstash_blob::BlobStore;
use chunkstash_crypto::ContentHasher;
use chunkstash_index::ContentHashIndex;
use chunkstash_kv::SetOptions;
use chunkstash_types::{ContentDigest, Key, KvValue};
use tracing::{debug, info};

use crate::error::{CaptureError, CaptureResult};
use crate::mirror::Mirror;
use crate::naming::ArtifactLayout;

/// An artifact read from the mirror.
#[derive(Clone, Debug)]
pub struct Artifact {
    pub path: PathBuf,
    pub data: Vec<u8>,
    pub digest: ContentDigest,
}

/// The archive of captured artifacts: a filesystem mirror, the blob store
/// holding the same content, and the content-hash index over both.
#[derive(Clone)]
pub struct Archive {
    mirror: Arc<dyn Mirror>,
    blobs: BlobStore,
    index: ContentHashIndex,
    layout: ArtifactLayout,
    hasher: ContentHasher,
}

impl Archive {
    pub fn new(
        mirror: Arc<dyn Mirror>,
        blobs: BlobStore,
        index: ContentHashIndex,
        layout: ArtifactLayout,
    ) -> Self {
        Self {
            mirror,
            blobs,
            index,
            layout,
            hasher: ContentHasher::ARTIFACT,
        }
    }

    pub fn mirror(&self) -> &Arc<dyn Mirror> {
        &self.mirror
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn index(&self) -> &ContentHashIndex {
        &self.index
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn digest(&self, data: &[u8]) -> ContentDigest {
        self.hasher.hash(data)
    }

    /// Archived artifacts below `root`, in walk order.
    pub async fn candidates(&self, root: &Path) -> CaptureResult<Vec<PathBuf>> {
        let files = self.mirror.walk(root).await?;
        Ok(files
            .into_iter()
            .filter(|p| self.layout.is_candidate(p))
            .collect())
    }

    /// Read and digest the artifact at `path`.
    pub async fn load(&self, path: &Path) -> CaptureResult<Artifact> {
        let data = self
            .mirror
            .read(path)
            .await?
            .ok_or_else(|| CaptureError::NotFound(path.to_path_buf()))?;
        let digest = self.digest(&data);
        Ok(Artifact {
            path: path.to_path_buf(),
            data,
            digest,
        })
    }

    /// Blob key for `path`; errors for paths outside the layout.
    pub fn key_for(&self, path: &Path) -> CaptureResult<Key> {
        self.layout
            .key_for_path(path)?
            .ok_or_else(|| CaptureError::InvalidArtifactPath {
                path: path.to_path_buf(),
                reason: "the latest artifact has no blob key".to_string(),
            })
    }

    /// Write `data` into the blob store under `key` and register its digest
    /// as first seen at `taken_at` unless it is already known.
    ///
    /// Returns the recorded first-seen identity.
    pub async fn store_blob(
        &self,
        key: &Key,
        data: &[u8],
        digest: &ContentDigest,
        taken_at: DateTime<Utc>,
    ) -> CaptureResult<KvValue> {
        self.blobs.set(key, data, SetOptions::default()).await?;
        let first_seen = self
            .index
            .get_or_insert(digest, KvValue::Timestamp(taken_at))
            .await?;
        debug!(key = %key, digest = %digest.short_hex(), "stored artifact blob");
        Ok(first_seen)
    }

    /// Remove the artifact at `path` from both the blob store and the mirror.
    ///
    /// The blob goes first, so a failed removal leaves the mirror file in
    /// place for the next walk.
    pub async fn discard(&self, path: &Path) -> CaptureResult<()> {
        let key = self.key_for(path)?;
        let chunks = self.blobs.remove(&key).await?;
        self.mirror.delete(path).await?;
        info!(path = %path.display(), chunks, "discarded artifact");
        Ok(())
    }
}
