//! Periodic artifact capture on top of the chunkstash blob store.
//!
//! An [`Archive`] keeps every captured artifact twice: as a file in a mirrored
//! directory tree (`<base>/<YYYY-MM-DD>/<HH_mm_ss>.jpg`) and as a blob keyed
//! `images/<YYYY-MM-DD>/<HH_mm_ss>`. A content-hash index records when each
//! distinct content was first seen.
//!
//! # Workflows
//!
//! - [`Capturer`] -- fetch the source, compare with the latest artifact,
//!   archive it when it changed (bounded retries with backoff)
//! - [`dedupe`] -- remove artifacts whose content repeats an earlier one
//! - [`reindex`] -- write mirrored artifacts that lack a blob into the store

pub mod archive;
pub mod capture;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fetch;
pub mod format;
pub mod mirror;
pub mod naming;
pub mod output;
pub mod reindex;

#[cfg(test)]
mod test_support;

pub use archive::{Archive, Artifact};
pub use capture::{CaptureOutcome, Capturer};
pub use config::CaptureConfig;
pub use dedup::{dedupe, DedupReport, Duplicate};
pub use error::{CaptureError, CaptureResult};
pub use fetch::{Fetcher, HttpFetcher, DEFAULT_FETCH_TIMEOUT_SECS};
pub use format::{format_bytes, format_delta};
pub use mirror::{FileStat, LocalMirror, Mirror};
pub use naming::ArtifactLayout;
pub use output::WorkflowOutput;
pub use reindex::{reindex, ReindexReport};
