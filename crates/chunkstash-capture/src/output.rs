//! Workflow step outputs for CI runners.

use std::io::Write;
use std::path::PathBuf;

use tracing::debug;

use crate::error::CaptureResult;

/// Environment variable naming the runner's output file.
pub const GITHUB_OUTPUT_ENV: &str = "GITHUB_OUTPUT";

/// Sink for `key=value` step outputs.
///
/// Appends to the file named by `GITHUB_OUTPUT` when one is configured and
/// falls back to the legacy `::set-output` stdout command otherwise.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkflowOutput {
    file: Option<PathBuf>,
}

impl WorkflowOutput {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self { file }
    }

    /// Read the output file from the environment. Empty values count as unset.
    pub fn from_env() -> Self {
        let file = std::env::var_os(GITHUB_OUTPUT_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self { file }
    }

    pub fn file(&self) -> Option<&PathBuf> {
        self.file.as_ref()
    }

    /// Emit one output. Trailing line breaks of `value` are dropped.
    pub fn set(&self, key: &str, value: &str) -> CaptureResult<()> {
        let line = format_line(key, value, self.file.is_some());
        match &self.file {
            Some(path) => {
                let mut file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                file.write_all(line.as_bytes())?;
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(line.as_bytes())?;
                stdout.flush()?;
            }
        }
        debug!(key, value, "workflow output set");
        Ok(())
    }
}

fn format_line(key: &str, value: &str, to_file: bool) -> String {
    let value = value.trim_end_matches(['\r', '\n']);
    if to_file {
        format!("{key}={value}\n")
    } else {
        format!("::set-output name={key}::{value}\n")
    }
}
