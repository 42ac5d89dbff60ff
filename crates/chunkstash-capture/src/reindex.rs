use std::path::Path;

use tracing::{info, warn};

use crate::archive::Archive;
use crate::error::CaptureResult;

/// Summary of one reindex walk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReindexReport {
    pub scanned: usize,
    /// Artifacts written into the blob store.
    pub written: usize,
    /// Bytes written into the blob store.
    pub bytes: u64,
    pub skipped: usize,
}

/// Write every mirrored artifact below `root` that has no blob yet into the
/// blob store, registering its digest as first seen at its capture time.
///
/// Failures on a single artifact are logged and skipped.
pub async fn reindex(archive: &Archive, root: &Path) -> CaptureResult<ReindexReport> {
    let mut report = ReindexReport::default();

    for path in archive.candidates(root).await? {
        report.scanned += 1;
        match visit(archive, &path).await {
            Ok(Some(size)) => {
                report.written += 1;
                report.bytes += size;
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
        written = report.written,
        bytes = report.bytes,
        skipped = report.skipped,
        "reindex complete"
    );
    Ok(report)
}

async fn visit(archive: &Archive, path: &Path) -> CaptureResult<Option<u64>> {
    let key = archive.key_for(path)?;
    if archive.blobs().exists(&key).await? {
        return Ok(None);
    }

    let artifact = archive.load(path).await?;
    if artifact.data.is_empty() {
        return Ok(None);
    }
    let Some(taken_at) = archive.layout().timestamp_for(path)? else {
        return Ok(None);
    };
    archive
        .store_blob(&key, &artifact.data, &artifact.digest, taken_at)
        .await?;
    info!(path = %path.display(), key = %key, size = artifact.data.len(), "indexed artifact");
    Ok(Some(artifact.data.len() as u64))
}
