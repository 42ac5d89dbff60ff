use serde::{Deserialize, Serialize};

/// Default payload bytes per chunk; fits under a 64 KiB value limit.
pub const DEFAULT_CHUNK_SIZE: usize = 63_000;

/// Default entries per listing page and deletes per removal sub-commit.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// How `remove` handles more chunks than fit in one batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveMode {
    /// Delete in sequential commits of `batch_size` keys. A failure midway
    /// leaves the earlier chunks deleted.
    #[default]
    SubBatches,
    /// Delete every chunk in one commit. Backends with a smaller mutation
    /// limit reject it.
    SingleCommit,
}

/// Chunking parameters for a [`BlobStore`](crate::BlobStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Payload bytes per chunk. Must be strictly below the backend's
    /// per-value limit.
    pub chunk_size: usize,
    pub batch_size: usize,
    pub remove_mode: RemoveMode,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            remove_mode: RemoveMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BlobConfig::default();
        assert_eq!(config.chunk_size, 63_000);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.remove_mode, RemoveMode::SubBatches);
    }
}
