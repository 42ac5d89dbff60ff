use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "stash",
    about = "chunkstash: chunked blob storage with content deduplication",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Key-value store file (overrides config and STASH_KV_PATH)
    #[arg(long, global = true)]
    pub kv_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch the source artifact and archive it if it changed
    Capture(CaptureArgs),
    /// Remove artifacts whose content repeats an earlier one
    Dedupe(DirArgs),
    /// Store mirrored artifacts that have no blob yet
    Reindex(DirArgs),
    /// Store a file as a blob
    Put(PutArgs),
    /// Read a blob
    Get(GetArgs),
    /// Remove a blob
    Rm(RmArgs),
    /// List blobs or unique key children
    Ls(LsArgs),
    /// Query the content-hash index
    Hash(HashArgs),
    /// Rewrite the store's log as a single snapshot
    Compact,
}

#[derive(Args)]
pub struct CaptureArgs {
    /// Source URL (overrides config)
    #[arg(long)]
    pub url: Option<String>,
    /// Mirror root (overrides config)
    #[arg(long)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct DirArgs {
    pub dir: PathBuf,
}

#[derive(Args)]
pub struct PutArgs {
    /// Blob key, `/`-separated
    pub key: String,
    pub file: PathBuf,
    /// Expire the blob after this many seconds
    #[arg(long)]
    pub ttl: Option<u64>,
}

#[derive(Args)]
pub struct GetArgs {
    pub key: String,
    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Copy chunk by chunk instead of buffering the whole blob
    #[arg(long)]
    pub stream: bool,
}

#[derive(Args)]
pub struct RmArgs {
    pub key: String,
}

#[derive(Args)]
pub struct LsArgs {
    pub prefix: Option<String>,
    /// List distinct children one level below the prefix
    #[arg(long)]
    pub unique: bool,
}

#[derive(Args)]
pub struct HashArgs {
    #[command(subcommand)]
    pub action: HashAction,
}

#[derive(Subcommand)]
pub enum HashAction {
    /// Show the first-seen identity of a digest
    Lookup { hex: String },
}
