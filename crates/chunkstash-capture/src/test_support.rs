use std::path::{Path, PathBuf};
use std::sync::Arc;

use chunkstash_blob::{BlobConfig, BlobStore};
use chunkstash_index::ContentHashIndex;
use chunkstash_kv::{InMemoryKv, SetOptions};

use crate::archive::Archive;
use crate::mirror::{LocalMirror, Mirror};
use crate::naming::ArtifactLayout;

/// An archive over a fresh in-memory backend, mirrored at `base`.
pub(crate) fn archive_at(base: &Path) -> Archive {
    let kv = Arc::new(InMemoryKv::new());
    let blobs = BlobStore::new(kv.clone(), BlobConfig::default()).unwrap();
    let index = ContentHashIndex::new(kv);
    Archive::new(
        Arc::new(LocalMirror),
        blobs,
        index,
        ArtifactLayout::new(base, "latest.jpg"),
    )
}

/// Write `data` to the mirror at `rel`, and to the blob store when the path
/// maps to a key.
pub(crate) async fn put(archive: &Archive, rel: &str, data: &[u8]) -> PathBuf {
    let path = archive.layout().base_dir().join(rel);
    archive.mirror().write(&path, data).await.unwrap();
    if let Ok(Some(key)) = archive.layout().key_for_path(&path) {
        archive
            .blobs()
            .set(&key, data, SetOptions::default())
            .await
            .unwrap();
    }
    path
}
