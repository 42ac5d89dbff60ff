use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, SubsecRound, Utc};
use chunkstash_crypto::timing_safe_eq;
use chunkstash_types::{ContentDigest, Key, KvValue};
use tracing::{debug, info, warn};

use crate::archive::Archive;
use crate::config::CaptureConfig;
use crate::error::{CaptureError, CaptureResult};
use crate::fetch::Fetcher;
use crate::mirror::Mirror;
use crate::output::WorkflowOutput;

/// Result of a capture that produced a new artifact.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureOutcome {
    pub path: PathBuf,
    pub key: Key,
    pub taken_at: DateTime<Utc>,
    pub size: u64,
    /// Size of the artifact it replaced as latest, if there was one.
    pub previous_size: Option<u64>,
    pub digest: ContentDigest,
    /// Identity the content-hash index holds for this content.
    pub first_seen: KvValue,
    pub fetch_failures: u32,
    pub unchanged_retries: u32,
}

impl CaptureOutcome {
    /// Size change relative to the previous latest artifact.
    pub fn size_delta(&self) -> i64 {
        self.size as i64 - self.previous_size.unwrap_or(0) as i64
    }
}

#[derive(Debug)]
enum CaptureState {
    Fetching,
    Comparing(Bytes),
    Unchanged,
    Changed {
        data: Bytes,
        previous_size: Option<u64>,
    },
    Written(CaptureOutcome),
    Failed(CaptureError),
}

/// Fetches the source artifact and archives it when it changed.
///
/// ```text
/// Fetching ──ok──▶ Comparing ──same──▶ Unchanged ──▶ Fetching | Failed
///    │                 └──differs──▶ Changed ──▶ Written
///    └──error──▶ (backoff) Fetching | Failed
/// ```
///
/// Fetch errors and unchanged content are counted separately; each kind
/// fails the capture once it reaches `max_attempts`.
pub struct Capturer {
    archive: Archive,
    fetcher: Arc<dyn Fetcher>,
    config: CaptureConfig,
    output: WorkflowOutput,
}

impl Capturer {
    pub fn new(
        archive: Archive,
        fetcher: Arc<dyn Fetcher>,
        config: CaptureConfig,
        output: WorkflowOutput,
    ) -> Self {
        Self {
            archive,
            fetcher,
            config,
            output,
        }
    }

    pub async fn run(&self) -> CaptureResult<CaptureOutcome> {
        if self.config.image_url.is_empty() {
            return Err(CaptureError::InvalidConfig("image_url is not set".into()));
        }
        if self.config.max_attempts == 0 {
            return Err(CaptureError::InvalidConfig("max_attempts must be positive".into()));
        }

        let url = self.config.image_url.as_str();
        let latest = self.archive.layout().latest_path();
        let max = self.config.max_attempts;
        let mut fetch_failures = 0u32;
        let mut unchanged = 0u32;
        let mut state = CaptureState::Fetching;

        loop {
            state = match state {
                CaptureState::Fetching => match self.fetcher.fetch(url).await {
                    Ok(data) => CaptureState::Comparing(data),
                    Err(e) => {
                        fetch_failures += 1;
                        if fetch_failures >= max {
                            CaptureState::Failed(CaptureError::FetchExhausted {
                                url: url.to_string(),
                                attempts: fetch_failures,
                                reason: e.to_string(),
                            })
                        } else {
                            let delay = self.config.fetch_backoff(fetch_failures);
                            warn!(
                                error = %e,
                                retry_in_secs = delay.as_secs(),
                                remaining = max - fetch_failures,
                                "fetch failed"
                            );
                            tokio::time::sleep(delay).await;
                            CaptureState::Fetching
                        }
                    }
                },
                CaptureState::Comparing(data) => {
                    match self.archive.mirror().read(&latest).await? {
                        Some(previous) if timing_safe_eq(&previous, &data) => {
                            CaptureState::Unchanged
                        }
                        previous => CaptureState::Changed {
                            data,
                            previous_size: previous.map(|p| p.len() as u64),
                        },
                    }
                }
                CaptureState::Unchanged => {
                    unchanged += 1;
                    if unchanged >= max {
                        CaptureState::Failed(CaptureError::Unchanged {
                            attempts: unchanged,
                        })
                    } else {
                        self.archive.mirror().touch(&latest, Utc::now()).await?;
                        let delay = self.config.retry_delay();
                        warn!(
                            retry_in_secs = delay.as_secs(),
                            remaining = max - unchanged,
                            "content unchanged"
                        );
                        tokio::time::sleep(delay).await;
                        CaptureState::Fetching
                    }
                }
                CaptureState::Changed {
                    data,
                    previous_size,
                } => {
                    let mut outcome = self.write(&data, previous_size).await?;
                    outcome.fetch_failures = fetch_failures;
                    outcome.unchanged_retries = unchanged;
                    CaptureState::Written(outcome)
                }
                CaptureState::Written(outcome) => return Ok(outcome),
                CaptureState::Failed(err) => return Err(err),
            };
            debug!(state = state_name(&state), "capture transition");
        }
    }

    async fn write(&self, data: &[u8], previous_size: Option<u64>) -> CaptureResult<CaptureOutcome> {
        let layout = self.archive.layout();
        let taken_at = Utc::now().trunc_subsecs(0);
        let path = layout.path_for(taken_at);
        let key = layout.key_for(taken_at);
        let digest = self.archive.digest(data);

        let first_seen = self
            .archive
            .store_blob(&key, data, &digest, taken_at)
            .await?;

        let mirror = self.archive.mirror();
        mirror.write(&path, data).await?;
        self.output.set("filename", &path.display().to_string())?;
        mirror.write(&layout.latest_path(), data).await?;

        info!(
            path = %path.display(),
            size = data.len(),
            digest = %digest.short_hex(),
            "captured new artifact"
        );

        Ok(CaptureOutcome {
            path,
            key,
            taken_at,
            size: data.len() as u64,
            previous_size,
            digest,
            first_seen,
            fetch_failures: 0,
            unchanged_retries: 0,
        })
    }
}

fn state_name(state: &CaptureState) -> &'static str {
    match state {
        CaptureState::Fetching => "fetching",
        CaptureState::Comparing(_) => "comparing",
        CaptureState::Unchanged => "unchanged",
        CaptureState::Changed { .. } => "changed",
        CaptureState::Written(_) => "written",
        CaptureState::Failed(_) => "failed",
    }
}
