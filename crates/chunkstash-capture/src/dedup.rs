use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chunkstash_types::{ContentDigest, KvValue};
use tracing::{info, warn};

use crate::archive::Archive;
use crate::error::CaptureResult;

/// An artifact removed because an earlier one had the same content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Duplicate {
    pub path: PathBuf,
    pub original: PathBuf,
    pub digest: ContentDigest,
}

/// Summary of one dedup walk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DedupReport {
    /// Candidate artifacts visited.
    pub scanned: usize,
    pub duplicates: Vec<Duplicate>,
    /// Artifacts skipped because reading or removing them failed.
    pub skipped: usize,
}

/// Remove every artifact below `root` whose content matches an artifact
/// visited earlier in the same walk.
///
/// Artifacts are visited in sorted path order, so the oldest capture of a
/// given content survives. The first occurrence of each digest is also
/// registered in the content-hash index; the index never decides deletions
/// on its own. Failures on a single artifact are logged and skipped.
pub async fn dedupe(archive: &Archive, root: &Path) -> CaptureResult<DedupReport> {
    let mut report = DedupReport::default();
    let mut seen: HashMap<ContentDigest, PathBuf> = HashMap::new();

    for path in archive.candidates(root).await? {
        report.scanned += 1;
        match visit(archive, &path, &mut seen).await {
            Ok(Some(duplicate)) => {
                info!(
                    path = %duplicate.path.display(),
                    original = %duplicate.original.display(),
                    digest = %duplicate.digest.short_hex(),
                    "removed duplicate artifact"
                );
                report.duplicates.push(duplicate);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping artifact");
                report.skipped += 1;
            }
        }
    }

    info!(
        scanned = report.scanned,
        duplicates = report.duplicates.len(),
        skipped = report.skipped,
        "dedup walk complete"
    );
    Ok(report)
}

async fn visit(
    archive: &Archive,
    path: &Path,
    seen: &mut HashMap<ContentDigest, PathBuf>,
) -> CaptureResult<Option<Duplicate>> {
    let artifact = archive.load(path).await?;

    match seen.entry(artifact.digest) {
        Entry::Occupied(first) if first.get() != path => {
            archive.discard(path).await?;
            Ok(Some(Duplicate {
                path: artifact.path,
                original: first.get().clone(),
                digest: artifact.digest,
            }))
        }
        Entry::Occupied(_) => Ok(None),
        Entry::Vacant(slot) => {
            if let Some(taken_at) = archive.layout().timestamp_for(path)? {
                archive
                    .index()
                    .insert_if_absent(&artifact.digest, KvValue::Timestamp(taken_at))
                    .await?;
            }
            slot.insert(artifact.path);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::Mirror;
    use crate::test_support::{archive_at, put};

    #[tokio::test]
    async fn identical_files_leave_one_survivor() {
        let dir = tempfile::tempdir().unwrap();
        let archive = archive_at(dir.path());

        let first = put(&archive, "2024-05-01/10_00_00.jpg", b"same frame").await;
        let second = put(&archive, "2024-05-01/10_05_00.jpg", b"same frame").await;
        let other = put(&archive, "2024-05-01/10_10_00.jpg", b"new frame").await;

        let report = dedupe(&archive, dir.path()).await.unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.duplicates.len(), 1);

        let dup = &report.duplicates[0];
        assert_eq!(dup.path, second);
        assert_eq!(dup.original, first);
        assert_eq!(dup.digest, archive.digest(b"same frame"));

        let survivor = archive.load(&first).await.unwrap();
        assert_eq!(survivor.digest, dup.digest);
        assert!(archive.mirror().read(&second).await.unwrap().is_none());
        assert!(archive.mirror().read(&other).await.unwrap().is_some());

        let second_key = archive.key_for(&second).unwrap();
        assert!(archive.blobs().get(&second_key).await.unwrap().is_none());
        let first_key = archive.key_for(&first).unwrap();
        assert!(archive.blobs().exists(&first_key).await.unwrap());
    }

    #[tokio::test]
    async fn first_occurrence_is_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let archive = archive_at(dir.path());
        let first = put(&archive, "2024-05-01/10_00_00.jpg", b"frame").await;
        put(&archive, "2024-05-02/09_00_00.jpg", b"frame").await;

        dedupe(&archive, dir.path()).await.unwrap();

        let digest = archive.digest(b"frame");
        let expected = archive.layout().timestamp_for(&first).unwrap();
        assert_eq!(archive.index().first_seen(&digest).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn latest_and_other_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let archive = archive_at(dir.path());
        put(&archive, "latest.jpg", b"frame").await;
        put(&archive, "2024-05-01/10_00_00.jpg", b"frame").await;
        put(&archive, "2024-05-01/notes.txt", b"frame").await;

        let report = dedupe(&archive, dir.path()).await.unwrap();
        assert_eq!(report.scanned, 1);
        assert!(report.duplicates.is_empty());
        assert!(archive
            .mirror()
            .read(&dir.path().join("latest.jpg"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn bad_paths_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let archive = archive_at(dir.path());
        put(&archive, "2024-05-01/10_00_00.jpg", b"frame").await;
        put(&archive, "misc/holiday.jpg", b"frame").await;

        let report = dedupe(&archive, dir.path()).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.skipped, 1);
        assert!(report.duplicates.is_empty());
    }
}
