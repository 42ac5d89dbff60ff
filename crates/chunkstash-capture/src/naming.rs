//! Mapping between capture timestamps, mirror paths and blob keys.
//!
//! An artifact captured at `2024-05-01T12:34:56Z` lives at
//! `<base>/2024-05-01/12_34_56.jpg` in the mirror and under the blob key
//! `images/2024-05-01/12_34_56`. All times are UTC.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use chunkstash_types::Key;

use crate::config::CaptureConfig;
use crate::error::{CaptureError, CaptureResult};

/// First key part of every artifact blob.
pub const IMAGE_KEY_PREFIX: &str = "images";

/// File extension of archived artifacts.
pub const ARTIFACT_EXTENSION: &str = "jpg";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H_%M_%S";

/// Where artifacts live in the mirror and the blob store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactLayout {
    base_dir: PathBuf,
    latest_name: String,
}

impl ArtifactLayout {
    pub fn new(base_dir: impl Into<PathBuf>, latest_name: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            latest_name: latest_name.into(),
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(&config.base_dir, &config.latest_name)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn latest_path(&self) -> PathBuf {
        self.base_dir.join(&self.latest_name)
    }

    /// Mirror path of an artifact captured at `at`.
    pub fn path_for(&self, at: DateTime<Utc>) -> PathBuf {
        self.base_dir
            .join(at.format(DATE_FORMAT).to_string())
            .join(format!("{}.{ARTIFACT_EXTENSION}", at.format(TIME_FORMAT)))
    }

    /// Blob key of an artifact captured at `at`.
    pub fn key_for(&self, at: DateTime<Utc>) -> Key {
        Key::new(vec![
            IMAGE_KEY_PREFIX.into(),
            at.format(DATE_FORMAT).to_string().into(),
            at.format(TIME_FORMAT).to_string().into(),
        ])
    }

    /// Returns `true` for the designated latest artifact.
    pub fn is_latest(&self, path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| name == self.latest_name.as_str())
    }

    /// Returns `true` for archived artifacts: the right extension, not latest.
    pub fn is_candidate(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == ARTIFACT_EXTENSION) && !self.is_latest(path)
    }

    /// Capture time encoded in `path`. The latest artifact has none.
    pub fn timestamp_for(&self, path: &Path) -> CaptureResult<Option<DateTime<Utc>>> {
        if self.is_latest(path) {
            return Ok(None);
        }
        let invalid = |reason: &str| CaptureError::InvalidArtifactPath {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let time = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| invalid("missing file name"))?;
        let date = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|s| s.to_str())
            .ok_or_else(|| invalid("missing date directory"))?;

        let naive = NaiveDateTime::parse_from_str(
            &format!("{date} {time}"),
            &format!("{DATE_FORMAT} {TIME_FORMAT}"),
        )
        .map_err(|e| invalid(&e.to_string()))?;
        Ok(Some(naive.and_utc()))
    }

    /// Blob key of the artifact at `path`. The latest artifact has none.
    pub fn key_for_path(&self, path: &Path) -> CaptureResult<Option<Key>> {
        Ok(self.timestamp_for(path)?.map(|at| self.key_for(at)))
    }
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self::from_config(&CaptureConfig::default())
    }
}
