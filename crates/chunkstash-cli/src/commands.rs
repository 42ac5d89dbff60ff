use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use bytes::{Bytes, BytesMut};
use chunkstash_blob::BlobStore;
use chunkstash_capture::{
    dedupe, format_bytes, format_delta, reindex, Archive, ArtifactLayout, Capturer, HttpFetcher,
    LocalMirror, WorkflowOutput, DEFAULT_FETCH_TIMEOUT_SECS,
};
use chunkstash_index::ContentHashIndex;
use chunkstash_kv::{FileKv, FileKvConfig, KvBackend, SetOptions};
use chunkstash_types::{ContentDigest, Key, KvValue};
use colored::Colorize;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::cli::*;
use crate::config::AppConfig;

const READ_SIZE: usize = 64 * 1024;

/// Open store handles shared by every command.
struct Stash {
    kv: Arc<FileKv>,
    blobs: BlobStore,
    index: ContentHashIndex,
    config: AppConfig,
}

impl Stash {
    fn open(config: AppConfig) -> anyhow::Result<Self> {
        let mut kv_config = FileKvConfig::new(&config.kv_path);
        kv_config.wal = config.wal.clone();
        let kv = Arc::new(
            FileKv::open(kv_config)
                .with_context(|| format!("opening store {}", config.kv_path.display()))?,
        );
        let backend: Arc<dyn KvBackend> = kv.clone();
        let blobs = BlobStore::new(Arc::clone(&backend), config.blob.clone())?;
        let index = ContentHashIndex::new(backend);
        debug!(path = %config.kv_path.display(), "opened store");
        Ok(Self {
            kv,
            blobs,
            index,
            config,
        })
    }

    fn archive(&self, base_dir: &Path) -> Archive {
        Archive::new(
            Arc::new(LocalMirror),
            self.blobs.clone(),
            self.index.clone(),
            ArtifactLayout::new(base_dir, &self.config.capture.latest_name),
        )
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.kv_path {
        config.kv_path = path;
    }
    let stash = Stash::open(config)?;

    let result = match cli.command {
        Command::Capture(args) => cmd_capture(&stash, args).await,
        Command::Dedupe(args) => cmd_dedupe(&stash, args).await,
        Command::Reindex(args) => cmd_reindex(&stash, args).await,
        Command::Put(args) => cmd_put(&stash, args).await,
        Command::Get(args) => cmd_get(&stash, args).await,
        Command::Rm(args) => cmd_rm(&stash, args).await,
        Command::Ls(args) => cmd_ls(&stash, args).await,
        Command::Hash(args) => cmd_hash(&stash, args).await,
        Command::Compact => cmd_compact(&stash),
    };
    let closed = stash.kv.close().await;
    result?;
    closed?;
    Ok(())
}

fn parse_key(text: &str) -> anyhow::Result<Key> {
    let key: Key = text.parse().with_context(|| format!("invalid key {text:?}"))?;
    if key.is_empty() {
        bail!("key must not be empty");
    }
    Ok(key)
}

async fn cmd_capture(stash: &Stash, args: CaptureArgs) -> anyhow::Result<()> {
    let mut config = stash.config.capture.clone();
    if let Some(url) = args.url {
        config.image_url = url;
    }
    if let Some(dir) = args.base_dir {
        config.base_dir = dir;
    }
    let archive = stash.archive(&config.base_dir);
    let output = WorkflowOutput::new(stash.config.github_output.clone());
    let fetcher = HttpFetcher::new(DEFAULT_FETCH_TIMEOUT_SECS)?;
    let capturer = Capturer::new(archive, Arc::new(fetcher), config, output);

    let outcome = capturer.run().await?;
    println!(
        "{} WROTE {} ({})",
        "✓".green().bold(),
        outcome.path.display().to_string().bold(),
        format_bytes(outcome.size)
    );
    if outcome.previous_size.is_some() {
        println!(
            "  {} latest ({})",
            "UPDATED".cyan(),
            format_delta(outcome.size_delta())
        );
    }
    println!("  Key: {}", outcome.key.to_string().yellow());
    println!("  Digest: {}", outcome.digest.short_hex().dimmed());
    if outcome.first_seen.as_timestamp() != Some(outcome.taken_at) {
        println!("  First seen: {}", describe(&outcome.first_seen));
    }
    if outcome.fetch_failures > 0 || outcome.unchanged_retries > 0 {
        println!(
            "  Retries: {} failed fetches, {} unchanged",
            outcome.fetch_failures, outcome.unchanged_retries
        );
    }
    Ok(())
}

async fn cmd_dedupe(stash: &Stash, args: DirArgs) -> anyhow::Result<()> {
    let report = dedupe(&stash.archive(&args.dir), &args.dir).await?;
    for dup in &report.duplicates {
        println!(
            "  {} {} (same as {})",
            "removed:".red(),
            dup.path.display(),
            dup.original.display().to_string().dimmed()
        );
    }
    println!(
        "{} Scanned {}, removed {} duplicates, skipped {}.",
        "✓".green().bold(),
        report.scanned,
        report.duplicates.len().to_string().bold(),
        report.skipped
    );
    Ok(())
}

async fn cmd_reindex(stash: &Stash, args: DirArgs) -> anyhow::Result<()> {
    let report = reindex(&stash.archive(&args.dir), &args.dir).await?;
    println!(
        "{} Scanned {}, wrote {} blobs ({}), skipped {}.",
        "✓".green().bold(),
        report.scanned,
        report.written.to_string().bold(),
        format_bytes(report.bytes),
        report.skipped
    );
    Ok(())
}

async fn next_piece(mut file: File) -> io::Result<Option<(Bytes, File)>> {
    let mut buf = BytesMut::with_capacity(READ_SIZE);
    if file.read_buf(&mut buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some((buf.freeze(), file)))
}

async fn cmd_put(stash: &Stash, args: PutArgs) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let file = File::open(&args.file)
        .await
        .with_context(|| format!("opening {}", args.file.display()))?;
    let size = file.metadata().await?.len();
    let options = match args.ttl {
        Some(secs) => SetOptions::expire_in(Duration::from_secs(secs)),
        None => SetOptions::default(),
    };

    let pieces = futures::stream::try_unfold(file, next_piece);
    stash.blobs.set_stream(&key, pieces, options).await?;
    println!(
        "{} Stored {} ({})",
        "✓".green().bold(),
        key.to_string().yellow(),
        format_bytes(size)
    );
    Ok(())
}

async fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn AsyncWrite + Unpin + Send>> {
    Ok(match path {
        Some(path) => Box::new(
            File::create(path)
                .await
                .with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    })
}

/// The output file is only created once the blob is known to exist.
async fn cmd_get(stash: &Stash, args: GetArgs) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;

    let (mut out, written) = if args.stream {
        let mut segments = stash.blobs.get_stream(&key);
        let Some(first) = segments.next().await else {
            bail!("no blob stored under {key}");
        };
        let first = first?;
        let mut out = open_output(args.output.as_deref()).await?;
        out.write_all(&first).await?;
        let mut written = first.len() as u64;
        while let Some(segment) = segments.next().await {
            let segment = segment?;
            out.write_all(&segment).await?;
            written += segment.len() as u64;
        }
        (out, written)
    } else {
        let Some(data) = stash.blobs.get(&key).await? else {
            bail!("no blob stored under {key}");
        };
        let mut out = open_output(args.output.as_deref()).await?;
        out.write_all(&data).await?;
        (out, data.len() as u64)
    };
    out.flush().await?;

    if let Some(path) = &args.output {
        eprintln!(
            "{} Wrote {} to {}",
            "✓".green().bold(),
            format_bytes(written),
            path.display()
        );
    }
    Ok(())
}

async fn cmd_rm(stash: &Stash, args: RmArgs) -> anyhow::Result<()> {
    let key = parse_key(&args.key)?;
    let chunks = stash.blobs.remove(&key).await?;
    if chunks == 0 {
        println!("No blob stored under {}.", key.to_string().yellow());
    } else {
        println!(
            "{} Removed {} ({} chunks)",
            "✓".green().bold(),
            key.to_string().yellow(),
            chunks
        );
    }
    Ok(())
}

async fn cmd_ls(stash: &Stash, args: LsArgs) -> anyhow::Result<()> {
    let prefix: Key = args
        .prefix
        .as_deref()
        .unwrap_or("")
        .parse()
        .context("invalid prefix")?;
    let keys = if args.unique {
        stash.blobs.unique(&prefix).await?
    } else {
        stash.blobs.blob_keys(&prefix).await?
    };
    for key in &keys {
        println!("{key}");
    }
    debug!(count = keys.len(), "listed keys");
    Ok(())
}

async fn cmd_hash(stash: &Stash, args: HashArgs) -> anyhow::Result<()> {
    match args.action {
        HashAction::Lookup { hex } => {
            let digest = ContentDigest::from_hex(&hex).context("invalid digest")?;
            match stash.index.lookup(&digest).await? {
                Some(value) => println!("{} {}", digest.short_hex().dimmed(), describe(&value)),
                None => println!("{} {}", digest.short_hex().dimmed(), "unknown".yellow()),
            }
        }
    }
    Ok(())
}

fn cmd_compact(stash: &Stash) -> anyhow::Result<()> {
    let before = stash.kv.log_size()?;
    let live = stash.kv.compact()?;
    let after = stash.kv.log_size()?;
    println!(
        "{} Compacted: {} live entries, log {} -> {}",
        "✓".green().bold(),
        live,
        format_bytes(before),
        format_bytes(after)
    );
    Ok(())
}

fn describe(value: &KvValue) -> String {
    match value {
        KvValue::Timestamp(at) => at.to_rfc3339(),
        KvValue::String(s) => s.clone(),
        KvValue::Int(i) => i.to_string(),
        KvValue::Bytes(b) => format!("{} bytes", b.len()),
    }
}
