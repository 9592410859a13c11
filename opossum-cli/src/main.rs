//! Local demonstration binary for the filesystem-backed event store.
//!
//! Exercises `opossum-fs::Store` directly as a library, the way the
//! engine's own test suite does — no network transport.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use opossum_core::{
    AppendCondition, EventStore, NewEvent, Query, QueryItem, ReadOptions, Tag,
};
use opossum_fs::{Store, StoreConfig};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "opossum", about = "Append-only filesystem event store")]
struct Cli {
    /// Directory under which the store's subdirectory lives.
    #[arg(long, global = true, env = "OPOSSUM_ROOT")]
    root: PathBuf,

    /// Store name; becomes the leaf directory under `root`.
    #[arg(long, global = true, env = "OPOSSUM_STORE")]
    store: String,

    /// Disable fsync on event files, indices, and the ledger.
    #[arg(long, global = true, env = "OPOSSUM_NO_FLUSH_IMMEDIATELY")]
    no_flush_immediately: bool,

    /// Mark committed event files read-only.
    #[arg(long, global = true, env = "OPOSSUM_WRITE_PROTECT")]
    write_protect: bool,

    /// Fsync index files in addition to event files and the ledger.
    #[arg(long, global = true, env = "OPOSSUM_FSYNC_INDICES")]
    fsync_indices: bool,

    /// Cross-process lock acquisition deadline, in seconds.
    #[arg(long, global = true, env = "OPOSSUM_LOCK_TIMEOUT_SECS", default_value_t = 5)]
    lock_timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append events read from a JSON file (an array of event objects).
    Append {
        /// Path to a JSON file: `[{"event_type": "...", "payload": ..., "tags": [...]}]`.
        file: PathBuf,

        /// Require that no event of this type exists yet before appending.
        #[arg(long)]
        fail_if_type_exists: Option<String>,
    },
    /// Read events matching an optional type and/or tag filter.
    Read {
        /// Restrict to this event type.
        #[arg(long = "type")]
        event_type: Option<String>,

        /// Restrict to a tag, formatted `key=value`. May be repeated.
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Only return positions strictly greater than this one.
        #[arg(long)]
        from_position: Option<u64>,

        /// Return results newest-first.
        #[arg(long)]
        descending: bool,
    },
    /// Tear down the entire store directory.
    DeleteStore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    tracing::debug!(root = %cli.root.display(), store = %cli.store, "resolved store location");

    let config = StoreConfig::new(cli.root.clone(), cli.store.clone())
        .context("building store configuration")?
        .with_flush_immediately(!cli.no_flush_immediately)
        .with_write_protect_event_files(cli.write_protect)
        .with_fsync_indices(cli.fsync_indices)
        .with_cross_process_lock_timeout(Duration::from_secs(cli.lock_timeout_secs));

    let store: Store<serde_json::Value> = Store::new(config);

    match cli.command {
        Command::Append {
            file,
            fail_if_type_exists,
        } => run_append(&store, &file, fail_if_type_exists).await,
        Command::Read {
            event_type,
            tags,
            from_position,
            descending,
        } => run_read(&store, event_type, tags, from_position, descending).await,
        Command::DeleteStore => run_delete_store(&store).await,
    }
}

async fn run_append(
    store: &Store<serde_json::Value>,
    file: &PathBuf,
    fail_if_type_exists: Option<String>,
) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("reading event file {}", file.display()))?;
    let events: Vec<NewEvent<serde_json::Value>> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing event file {}", file.display()))?;
    if events.is_empty() {
        anyhow::bail!("event file {} contains no events", file.display());
    }

    let condition = fail_if_type_exists
        .map(|event_type| AppendCondition::fail_if_events_match(Query::for_type(event_type)));

    let sequenced = store
        .append(events, condition, CancellationToken::new())
        .await
        .context("appending events")?;

    for event in &sequenced {
        println!("{} {}", event.position, event.event_type);
    }
    Ok(())
}

async fn run_read(
    store: &Store<serde_json::Value>,
    event_type: Option<String>,
    tags: Vec<String>,
    from_position: Option<u64>,
    descending: bool,
) -> anyhow::Result<()> {
    let mut parsed_tags = Vec::with_capacity(tags.len());
    for tag in tags {
        let (key, value) = tag
            .split_once('=')
            .with_context(|| format!("tag filter {tag:?} must be formatted key=value"))?;
        parsed_tags.push(Tag::new(key, value));
    }

    let query = if event_type.is_none() && parsed_tags.is_empty() {
        Query::match_all()
    } else {
        let mut item = QueryItem::new();
        if let Some(event_type) = event_type {
            item = item.with_types([event_type]);
        }
        if !parsed_tags.is_empty() {
            item = item.with_tags(parsed_tags);
        }
        Query::single(item)
    };

    let options = if descending {
        ReadOptions::descending()
    } else {
        ReadOptions::default()
    };

    let events = store
        .read(query, options, from_position, CancellationToken::new())
        .await
        .context("reading events")?;

    for event in &events {
        let payload = serde_json::to_string(&event.payload).unwrap_or_default();
        println!("{} {} {}", event.position, event.event_type, payload);
    }
    Ok(())
}

async fn run_delete_store(store: &Store<serde_json::Value>) -> anyhow::Result<()> {
    store
        .delete_store()
        .await
        .context("deleting store directory")?;
    println!("deleted {}", store.store_dir().display());
    Ok(())
}
