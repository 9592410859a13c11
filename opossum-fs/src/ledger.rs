//! The ledger: the single authoritative "highest committed position" value.
//!
//! The ledger is the sole source of truth for "which positions exist" — see
//! the module-level crash-window note below. There is no startup scan that
//! re-derives it from the `events/` directory; that would change the
//! durability/cost tradeoff the spec is explicit about.
//!
//! Known limitation (spec §9 open question #2): a crash between writing
//! event files and advancing the ledger leaves "orphan" event files at
//! positions greater than the ledger value. They are silently overwritten
//! the next time those positions are reallocated by a subsequent append.
//! Recovering or promoting them after an unclean shutdown is an operator
//! task, not something this crate does automatically.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::atomic_file;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFileContents {
    position: u64,
    /// Informational only; never read back to drive behavior.
    #[serde(default)]
    event_count: u64,
}

pub struct Ledger {
    path: PathBuf,
    fsync: bool,
}

impl Ledger {
    pub fn new(store_dir: &Path, fsync: bool) -> Self {
        Self {
            path: crate::paths::ledger_path(store_dir),
            fsync,
        }
    }

    /// The highest committed position, or 0 if the ledger file does not
    /// exist or cannot be parsed (a corrupted ledger is treated as empty and
    /// recovered by the next successful `advance`).
    pub async fn current(&self) -> std::io::Result<u64> {
        match atomic_file::read_retrying(&self.path).await? {
            None => Ok(0),
            Some(bytes) => match serde_json::from_slice::<LedgerFileContents>(&bytes) {
                Ok(contents) => Ok(contents.position),
                Err(_) => Ok(0),
            },
        }
    }

    /// The next position to assign: `current() + 1`. Only meaningful when
    /// called under the caller's in-process append mutex, since this is a
    /// plain read with no locking of its own.
    pub async fn next(&self) -> std::io::Result<u64> {
        Ok(self.current().await? + 1)
    }

    /// Overwrites the ledger with `new_value`, atomically (temp + rename)
    /// and, when durability is enabled, fsynced before the rename.
    pub async fn advance(&self, new_value: u64) -> std::io::Result<()> {
        let contents = LedgerFileContents {
            position: new_value,
            event_count: new_value,
        };
        let bytes = serde_json::to_vec(&contents).expect("ledger contents always serialize");
        atomic_file::write_atomic(&self.path, bytes, self.fsync).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn current_is_zero_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path(), true);
        assert_eq!(ledger.current().await.unwrap(), 0);
        assert_eq!(ledger.next().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn advance_persists_and_next_reflects_it() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path(), true);
        ledger.advance(3).await.unwrap();
        assert_eq!(ledger.current().await.unwrap(), 3);
        assert_eq!(ledger.next().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn corrupted_ledger_reads_as_zero_and_self_heals() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path(), true);
        tokio::fs::create_dir_all(dir.path()).await.unwrap();
        tokio::fs::write(&ledger.path, b"not json").await.unwrap();
        assert_eq!(ledger.current().await.unwrap(), 0);
        ledger.advance(1).await.unwrap();
        assert_eq!(ledger.current().await.unwrap(), 1);
    }
}
