use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the capture workflow and the mirror layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Source of the artifact. Must be set before capturing.
    pub image_url: String,
    /// Root of the mirrored tree.
    pub base_dir: PathBuf,
    /// File name of the latest artifact, directly under `base_dir`.
    pub latest_name: String,
    /// Attempts per failure kind (fetch errors, unchanged content).
    pub max_attempts: u32,
    /// Pause before refetching unchanged content, in seconds.
    pub retry_delay_secs: u64,
    /// Lower bound of the fetch backoff, in seconds.
    pub min_backoff_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            image_url: String::new(),
            base_dir: PathBuf::from("./assets"),
            latest_name: "latest.jpg".to_string(),
            max_attempts: 3,
            retry_delay_secs: 30,
            min_backoff_secs: 16,
        }
    }
}

impl CaptureConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Delay before the fetch following the `failures`-th failed one:
    /// `max(min_backoff, 2^failures)` seconds.
    pub fn fetch_backoff(&self, failures: u32) -> Duration {
        let exp = 1u64.checked_shl(failures).unwrap_or(u64::MAX);
        Duration::from_secs(exp.max(self.min_backoff_secs))
    }

    pub fn latest_path(&self) -> PathBuf {
        self.base_dir.join(&self.latest_name)
    }
}
