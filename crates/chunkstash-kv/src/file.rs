use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use chunkstash_types::Key;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::atomic::{AtomicBatch, CommitOutcome};
use crate::error::{KvError, KvResult};
use crate::selector::Selector;
use crate::state::KvState;
use crate::traits::{KvBackend, KvEntry, KvLimits};
use crate::wal::{WalConfig, WalRecord, WriteAheadLog};

/// Settings for a [`FileKv`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileKvConfig {
    /// Path of the log file. Parent directories are created on open.
    pub path: PathBuf,
    #[serde(default)]
    pub wal: WalConfig,
    #[serde(skip, default)]
    pub limits: KvLimits,
}

impl FileKvConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            wal: WalConfig::default(),
            limits: KvLimits::default(),
        }
    }
}

/// Durable backend: the in-memory state rebuilt from a write-ahead log.
///
/// Every successful commit is appended to the log before it becomes
/// visible. [`FileKv::compact`] folds the log into a single snapshot record.
pub struct FileKv {
    state: RwLock<KvState>,
    wal: WriteAheadLog,
    limits: KvLimits,
    closed: AtomicBool,
}

impl FileKv {
    /// Open the store at `config.path`, replaying any existing log.
    pub fn open(config: FileKvConfig) -> KvResult<Self> {
        let wal = WriteAheadLog::open(&config.path, config.wal)?;

        let mut state = KvState::new();
        let mut commits = 0usize;
        for record in wal.recover()? {
            match record {
                WalRecord::Snapshot {
                    versionstamp,
                    entries,
                } => state.restore(versionstamp, entries),
                WalRecord::Commit {
                    versionstamp,
                    mutations,
                } => {
                    state.apply(versionstamp, mutations);
                    commits += 1;
                }
            }
        }

        info!(
            path = %config.path.display(),
            commits,
            last = %state.last_versionstamp(),
            "opened file kv"
        );

        Ok(Self {
            state: RwLock::new(state),
            wal,
            limits: config.limits,
            closed: AtomicBool::new(false),
        })
    }

    /// Open at `path` with default settings.
    pub fn open_path(path: impl AsRef<Path>) -> KvResult<Self> {
        Self::open(FileKvConfig::new(path.as_ref()))
    }

    fn ensure_open(&self) -> KvResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KvError::Closed);
        }
        Ok(())
    }

    fn read(&self) -> KvResult<RwLockReadGuard<'_, KvState>> {
        self.ensure_open()?;
        self.state
            .read()
            .map_err(|e| KvError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> KvResult<RwLockWriteGuard<'_, KvState>> {
        self.ensure_open()?;
        self.state
            .write()
            .map_err(|e| KvError::LockPoisoned(e.to_string()))
    }

    /// Drop expired entries and rewrite the log as one snapshot.
    ///
    /// Returns the number of live entries written.
    pub fn compact(&self) -> KvResult<usize> {
        let mut state = self.write()?;
        let purged = state.purge_expired(Utc::now());
        let entries = state.snapshot();
        let live = entries.len();
        self.wal.rewrite(&[WalRecord::Snapshot {
            versionstamp: state.last_versionstamp(),
            entries,
        }])?;
        info!(live, purged, "compacted file kv");
        Ok(live)
    }

    /// Number of live entries.
    pub fn len(&self) -> KvResult<usize> {
        Ok(self.read()?.len(Utc::now()))
    }

    pub fn is_empty(&self) -> KvResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Current size of the log file in bytes.
    pub fn log_size(&self) -> KvResult<u64> {
        self.wal.offset()
    }

    pub fn path(&self) -> &Path {
        self.wal.path()
    }
}

#[async_trait]
impl KvBackend for FileKv {
    async fn get(&self, key: &Key) -> KvResult<Option<KvEntry>> {
        Ok(self.read()?.get(key, Utc::now()))
    }

    async fn list_page(
        &self,
        selector: &Selector,
        after: Option<&Key>,
        limit: usize,
    ) -> KvResult<Vec<KvEntry>> {
        Ok(self.read()?.list_page(selector, after, limit, Utc::now()))
    }

    async fn commit(&self, batch: AtomicBatch) -> KvResult<CommitOutcome> {
        KvState::validate(&batch, &self.limits)?;

        let mut state = self.write()?;
        let now = Utc::now();
        if !state.checks_pass(&batch, now) {
            return Ok(CommitOutcome::Conflict);
        }

        let stamp = state.next_versionstamp();
        let mutations = KvState::resolve(batch, now);
        self.wal.append(&WalRecord::Commit {
            versionstamp: stamp,
            mutations: mutations.clone(),
        })?;
        state.apply(stamp, mutations);
        debug!(versionstamp = %stamp, "commit logged");
        Ok(CommitOutcome::Committed(stamp))
    }

    fn limits(&self) -> KvLimits {
        self.limits
    }

    async fn close(&self) -> KvResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.wal.sync()
    }
}
