//! A single index file: a sorted, deduplicated list of positions for one
//! key (an event type name, or a `(tag_key, tag_value)` pair).
//!
//! This is the physical layer beneath [`crate::index::KeyedIndex`]; it knows
//! nothing about type/tag semantics, only how to atomically read and write
//! one sorted-list file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::atomic_file;

#[derive(Debug, Default, Serialize, Deserialize)]
struct PositionIndexFileContents {
    positions: Vec<u64>,
}

/// Reads the sorted position list at `path`. A missing file yields an empty
/// list; a corrupted file is treated as empty too (self-healing on the next
/// write), per the spec's "corrupted index files are treated as empty"
/// policy.
pub async fn read_positions(path: &Path) -> std::io::Result<Vec<u64>> {
    match atomic_file::read_retrying(path).await? {
        None => Ok(Vec::new()),
        Some(bytes) => match serde_json::from_slice::<PositionIndexFileContents>(&bytes) {
            Ok(contents) => Ok(contents.positions),
            Err(_) => Ok(Vec::new()),
        },
    }
}

/// Overwrites `path` with `positions`, which must already be sorted and
/// deduplicated by the caller.
pub async fn write_positions(path: &Path, positions: &[u64], fsync: bool) -> std::io::Result<()> {
    let contents = PositionIndexFileContents {
        positions: positions.to_vec(),
    };
    let bytes = serde_json::to_vec(&contents).expect("position list is always serializable");
    atomic_file::write_atomic(path, bytes, fsync).await
}

/// Inserts `position` into the sorted list read from `path` if absent, and
/// writes the result back. Returns whether an insertion actually happened
/// (false when the position was already present — duplicate adds are a
/// silent no-op per the spec).
pub async fn insert_position(path: &Path, position: u64, fsync: bool) -> std::io::Result<bool> {
    let mut positions = read_positions(path).await?;
    match positions.binary_search(&position) {
        Ok(_) => Ok(false),
        Err(insert_at) => {
            positions.insert(insert_at, position);
            write_positions(path, &positions, fsync).await?;
            Ok(true)
        }
    }
}

/// Checks whether an index file exists for the given path without reading
/// its contents.
pub async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

pub fn path_for_directory_and_stem(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}.json"))
}
