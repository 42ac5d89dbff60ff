use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::trace;
use walkdir::WalkDir;

use crate::error::CaptureResult;

/// Size and modification time of a mirrored file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// A filesystem tree mirroring the archived artifacts.
#[async_trait]
pub trait Mirror: Send + Sync {
    /// Read a file. Returns `Ok(None)` if it does not exist.
    async fn read(&self, path: &Path) -> CaptureResult<Option<Vec<u8>>>;

    /// Every regular file below `root`, in sorted order.
    async fn walk(&self, root: &Path) -> CaptureResult<Vec<PathBuf>>;

    /// Write a file, creating parent directories as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> CaptureResult<()>;

    /// Delete a file. Returns `false` if it did not exist.
    async fn delete(&self, path: &Path) -> CaptureResult<bool>;

    async fn stat(&self, path: &Path) -> CaptureResult<Option<FileStat>>;

    /// Set a file's modification time.
    async fn touch(&self, path: &Path, at: DateTime<Utc>) -> CaptureResult<()>;
}

/// [`Mirror`] over the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalMirror;

fn not_found_as_none<T>(result: io::Result<T>) -> CaptureResult<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl Mirror for LocalMirror {
    async fn read(&self, path: &Path) -> CaptureResult<Option<Vec<u8>>> {
        not_found_as_none(tokio::fs::read(path).await)
    }

    async fn walk(&self, root: &Path) -> CaptureResult<Vec<PathBuf>> {
        let root = root.to_path_buf();
        let files = tokio::task::spawn_blocking(move || -> io::Result<Vec<PathBuf>> {
            let mut files = Vec::new();
            for entry in WalkDir::new(&root).sort_by_file_name() {
                let entry = entry.map_err(io::Error::from)?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
            Ok(files)
        })
        .await
        .map_err(io::Error::other)??;
        trace!(count = files.len(), "walked mirror");
        Ok(files)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> CaptureResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    async fn delete(&self, path: &Path) -> CaptureResult<bool> {
        Ok(not_found_as_none(tokio::fs::remove_file(path).await)?.is_some())
    }

    async fn stat(&self, path: &Path) -> CaptureResult<Option<FileStat>> {
        let Some(meta) = not_found_as_none(tokio::fs::metadata(path).await)? else {
            return Ok(None);
        };
        Ok(Some(FileStat {
            size: meta.len(),
            modified: meta.modified()?.into(),
        }))
    }

    async fn touch(&self, path: &Path, at: DateTime<Utc>) -> CaptureResult<()> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> io::Result<()> {
            let file = std::fs::OpenOptions::new().write(true).open(&path)?;
            file.set_modified(at.into())
        })
        .await
        .map_err(io::Error::other)??;
        Ok(())
    }
}
