use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use chunkstash_types::{Key, KvValue, Versionstamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{KvError, KvResult};

/// A resolved set/delete, with TTLs turned into absolute expiry times so a
/// replay reproduces the same state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    Set {
        key: Key,
        value: KvValue,
        expires_at: Option<DateTime<Utc>>,
    },
    Delete {
        key: Key,
    },
}

/// One entry of a compacted snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: Key,
    pub value: KvValue,
    pub versionstamp: Versionstamp,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A single WAL record.
///
/// On-disk format:
/// ```text
/// [4 bytes: record length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized WalRecord)]
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WalRecord {
    /// The mutations of one successful commit.
    Commit {
        versionstamp: Versionstamp,
        mutations: Vec<Mutation>,
    },
    /// Full state as of `versionstamp`; replaces everything before it.
    Snapshot {
        versionstamp: Versionstamp,
        entries: Vec<SnapshotEntry>,
    },
}

/// Flush/sync strategy for the WAL.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every commit (safest, highest latency).
    EveryWrite,
    /// Flush to the OS page cache only.
    #[default]
    OsDefault,
}

/// Configuration for the write-ahead log.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WalConfig {
    #[serde(default)]
    pub sync_mode: SyncMode,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

struct WalWriter {
    writer: BufWriter<File>,
    /// Current write offset in the log file.
    offset: u64,
}

/// Crash-recoverable write-ahead log of committed batches.
///
/// Records are serialized with bincode, framed with a length prefix and a
/// CRC32 checksum, and appended to a single file. On recovery the file is
/// read front-to-back; records that fail the CRC check are skipped and a
/// torn tail ends recovery.
pub struct WriteAheadLog {
    path: PathBuf,
    writer: Mutex<WalWriter>,
    config: WalConfig,
}

impl WriteAheadLog {
    /// Open (or create) the log file at the given path.
    pub fn open(path: &Path, config: WalConfig) -> KvResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let offset = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(WalWriter {
                writer: BufWriter::new(file),
                offset,
            }),
            config,
        })
    }

    fn lock(&self) -> KvResult<std::sync::MutexGuard<'_, WalWriter>> {
        self.writer
            .lock()
            .map_err(|e| KvError::LockPoisoned(e.to_string()))
    }

    fn encode(record: &WalRecord) -> KvResult<Vec<u8>> {
        let payload =
            bincode::serialize(record).map_err(|e| KvError::Serialization(e.to_string()))?;
        let mut framed = Vec::with_capacity(HEADER_SIZE + payload.len());
        framed.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        framed.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        framed.extend_from_slice(&payload);
        Ok(framed)
    }

    /// Append a record. Returns the byte offset it was written at.
    ///
    /// A failed write is cut back off the log so the next append starts at
    /// a record boundary.
    pub fn append(&self, record: &WalRecord) -> KvResult<u64> {
        let framed = Self::encode(record)?;

        let mut w = self.lock()?;
        let record_offset = w.offset;

        if let Err(e) = self.write_framed(&mut w, &framed) {
            if let Err(cut) = self.truncate_to(&mut w, record_offset) {
                warn!(offset = record_offset, error = %cut, "failed to cut partial WAL record");
            }
            return Err(e.into());
        }
        w.offset += framed.len() as u64;

        debug!(offset = record_offset, len = framed.len(), "WAL append");
        Ok(record_offset)
    }

    fn write_framed(&self, w: &mut WalWriter, framed: &[u8]) -> io::Result<()> {
        w.writer.write_all(framed)?;
        w.writer.flush()?;
        if self.config.sync_mode == SyncMode::EveryWrite {
            w.writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Drop everything past `len` and continue appending from there.
    fn truncate_to(&self, w: &mut WalWriter, len: u64) -> KvResult<()> {
        // Replacing the writer drops any bytes still buffered in the old one.
        let file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        w.writer = BufWriter::new(file);
        w.writer.get_ref().set_len(len)?;
        w.writer.get_ref().sync_all()?;
        w.offset = len;
        Ok(())
    }

    /// Recover all valid records, in append order.
    ///
    /// A torn tail is cut off so records appended afterwards stay readable.
    pub fn recover(&self) -> KvResult<Vec<WalRecord>> {
        let mut file = BufReader::new(File::open(&self.path)?);
        let file_len = file.get_ref().metadata()?.len();
        let mut records = Vec::new();
        let mut offset: u64 = 0;

        while offset + HEADER_SIZE as u64 <= file_len {
            file.seek(SeekFrom::Start(offset))?;

            let mut header = [0u8; HEADER_SIZE];
            match file.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            if length == 0 || (offset + HEADER_SIZE as u64 + length as u64) > file_len {
                warn!(
                    offset,
                    length, file_len, "invalid WAL record length; stopping recovery"
                );
                break;
            }

            let mut payload = vec![0u8; length as usize];
            match file.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn!(offset, "truncated WAL record; stopping recovery");
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let actual_crc = crc32fast::hash(&payload);
            if actual_crc != expected_crc {
                warn!(
                    offset,
                    expected = expected_crc,
                    actual = actual_crc,
                    "CRC mismatch; skipping record"
                );
                offset += HEADER_SIZE as u64 + length as u64;
                continue;
            }

            match bincode::deserialize::<WalRecord>(&payload) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(offset, error = %e, "failed to deserialize WAL record; skipping");
                }
            }

            offset += HEADER_SIZE as u64 + length as u64;
        }

        if offset < file_len {
            warn!(valid_end = offset, file_len, "cutting torn WAL tail");
            let mut w = self.lock()?;
            w.writer.flush()?;
            self.truncate_to(&mut w, offset)?;
        }

        debug!(recovered = records.len(), "WAL recovery complete");
        Ok(records)
    }

    /// Atomically replace the whole log with `records`.
    ///
    /// The new content is written to a temporary file in the same directory
    /// and renamed over the log, so a crash leaves either the old or the new
    /// log, never a mix.
    pub fn rewrite(&self, records: &[WalRecord]) -> KvResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut w = self.lock()?;
        w.writer.flush()?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        let mut written: u64 = 0;
        for record in records {
            let framed = Self::encode(record)?;
            tmp.write_all(&framed)?;
            written += framed.len() as u64;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| KvError::Io(e.error))?;

        let file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        w.writer = BufWriter::new(file);
        w.offset = written;

        debug!(records = records.len(), bytes = written, "WAL rewritten");
        Ok(())
    }

    /// Flush buffered data and fsync the file.
    pub fn sync(&self) -> KvResult<()> {
        let mut w = self.lock()?;
        w.writer.flush()?;
        w.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Current write offset.
    pub fn offset(&self) -> KvResult<u64> {
        Ok(self.lock()?.offset)
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkstash_types::key;

    fn commit_record(seq: u64) -> WalRecord {
        WalRecord::Commit {
            versionstamp: Versionstamp::from_u64(seq),
            mutations: vec![
                Mutation::Set {
                    key: key!["k", seq as i64],
                    value: KvValue::Bytes(vec![seq as u8; 16]),
                    expires_at: None,
                },
                Mutation::Delete {
                    key: key!["old", seq as i64],
                },
            ],
        }
    }

    #[test]
    fn append_and_recover_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let wal = WriteAheadLog::open(&dir.path().join("kv.wal"), WalConfig::default()).unwrap();

        for seq in 1..=3 {
            wal.append(&commit_record(seq)).unwrap();
        }

        let recovered = wal.recover().unwrap();
        assert_eq!(recovered, vec![commit_record(1), commit_record(2), commit_record(3)]);
    }

    #[test]
    fn recover_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let wal = WriteAheadLog::open(&dir.path().join("empty.wal"), WalConfig::default()).unwrap();
        assert!(wal.recover().unwrap().is_empty());
    }

    #[test]
    fn crc_detects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.wal");
        let wal = WriteAheadLog::open(&path, WalConfig::default()).unwrap();
        wal.append(&commit_record(1)).unwrap();
        wal.append(&commit_record(2)).unwrap();
        drop(wal);

        {
            let mut file = OpenOptions::new().write(true).read(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            let mut buf = [0u8; 1];
            file.read_exact(&mut buf).unwrap();
            buf[0] ^= 0xFF;
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            file.write_all(&buf).unwrap();
            file.sync_all().unwrap();
        }

        let wal = WriteAheadLog::open(&path, WalConfig::default()).unwrap();
        let recovered = wal.recover().unwrap();
        assert_eq!(recovered, vec![commit_record(2)]);
    }

    #[test]
    fn recovery_survives_truncated_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tail.wal");
        let wal = WriteAheadLog::open(&path, WalConfig::default()).unwrap();
        wal.append(&commit_record(1)).unwrap();
        wal.append(&commit_record(2)).unwrap();
        let total_len = wal.offset().unwrap();
        drop(wal);

        {
            let file = OpenOptions::new().write(true).open(&path).unwrap();
            file.set_len(total_len - 4).unwrap();
        }

        let wal = WriteAheadLog::open(&path, WalConfig::default()).unwrap();
        assert_eq!(wal.recover().unwrap(), vec![commit_record(1)]);
    }

    #[test]
    fn appends_after_torn_tail_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("torn.wal");
        let wal = WriteAheadLog::open(&path, WalConfig::default()).unwrap();
        wal.append(&commit_record(1)).unwrap();
        let first_end = wal.offset().unwrap();
        wal.append(&commit_record(2)).unwrap();
        let total_len = wal.offset().unwrap();
        drop(wal);

        {
            let file = OpenOptions::new().write(true).open(&path).unwrap();
            file.set_len(total_len - 4).unwrap();
        }

        let wal = WriteAheadLog::open(&path, WalConfig::default()).unwrap();
        assert_eq!(wal.recover().unwrap(), vec![commit_record(1)]);
        assert_eq!(wal.offset().unwrap(), first_end);
        assert_eq!(fs::metadata(&path).unwrap().len(), first_end);

        for seq in 3..=5 {
            wal.append(&commit_record(seq)).unwrap();
        }
        drop(wal);

        let wal = WriteAheadLog::open(&path, WalConfig::default()).unwrap();
        assert_eq!(
            wal.recover().unwrap(),
            vec![
                commit_record(1),
                commit_record(3),
                commit_record(4),
                commit_record(5)
            ]
        );
    }

    #[test]
    fn short_garbage_tail_is_cut() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wal");
        let wal = WriteAheadLog::open(&path, WalConfig::default()).unwrap();
        wal.append(&commit_record(1)).unwrap();
        let end = wal.offset().unwrap();
        drop(wal);

        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[0xAB, 0xCD, 0xEF]).unwrap();
        }

        let wal = WriteAheadLog::open(&path, WalConfig::default()).unwrap();
        assert_eq!(wal.recover().unwrap(), vec![commit_record(1)]);
        assert_eq!(fs::metadata(&path).unwrap().len(), end);
    }

    #[test]
    fn rewrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rewrite.wal");
        let wal = WriteAheadLog::open(&path, WalConfig::default()).unwrap();
        for seq in 1..=4 {
            wal.append(&commit_record(seq)).unwrap();
        }

        let snapshot = WalRecord::Snapshot {
            versionstamp: Versionstamp::from_u64(4),
            entries: vec![SnapshotEntry {
                key: key!["k", 4i64],
                value: KvValue::Bytes(vec![4u8; 16]),
                versionstamp: Versionstamp::from_u64(4),
                expires_at: None,
            }],
        };
        wal.rewrite(std::slice::from_ref(&snapshot)).unwrap();
        wal.append(&commit_record(5)).unwrap();

        let recovered = wal.recover().unwrap();
        assert_eq!(recovered, vec![snapshot, commit_record(5)]);
    }

    #[test]
    fn append_returns_increasing_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let config = WalConfig {
            sync_mode: SyncMode::EveryWrite,
        };
        let wal = WriteAheadLog::open(&dir.path().join("offsets.wal"), config).unwrap();

        let off1 = wal.append(&commit_record(1)).unwrap();
        let off2 = wal.append(&commit_record(2)).unwrap();
        assert_eq!(off1, 0);
        assert!(off2 > off1);
    }
}
