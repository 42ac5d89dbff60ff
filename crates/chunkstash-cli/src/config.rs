//! Layered application settings: TOML file, then environment, then flags.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chunkstash_blob::BlobConfig;
use chunkstash_capture::CaptureConfig;
use chunkstash_kv::WalConfig;
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`AppConfig::kv_path`].
pub const KV_PATH_ENV: &str = "STASH_KV_PATH";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Log file of the key-value store.
    pub kv_path: PathBuf,
    pub wal: WalConfig,
    pub blob: BlobConfig,
    pub capture: CaptureConfig,
    /// Where workflow outputs are appended. Falls back to `GITHUB_OUTPUT`.
    pub github_output: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            kv_path: PathBuf::from("./stash.kv"),
            wal: WalConfig::default(),
            blob: BlobConfig::default(),
            capture: CaptureConfig::default(),
            github_output: None,
        }
    }
}

impl AppConfig {
    /// Read `path` if given, otherwise start from defaults, then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::from_toml(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        Ok(config.with_env(|name| std::env::var_os(name)))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn with_env(mut self, var: impl Fn(&str) -> Option<std::ffi::OsString>) -> Self {
        if let Some(path) = var(KV_PATH_ENV).filter(|v| !v.is_empty()) {
            self.kv_path = path.into();
        }
        if self.github_output.is_none() {
            self.github_output = var(chunkstash_capture::output::GITHUB_OUTPUT_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from);
        }
        self
    }
}
