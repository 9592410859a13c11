//! One [`SequencedEvent`] ↔ one file, named by its fixed-width zero-padded
//! position. Writes go through the same temp-file + fsync + rename pipeline
//! as every other structure in this crate; reads are batched with a bounded
//! degree of parallelism for bulk queries.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::try_join_all;
use opossum_core::{SequencedEvent, StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Semaphore;

use crate::atomic_file;
use crate::paths;

/// Batches at or below this size are read sequentially; larger batches are
/// read in parallel (I/O-bound workload, so the degree of parallelism can
/// exceed the CPU count).
const PARALLEL_READ_THRESHOLD: usize = 10;

pub struct EventFileStore {
    store_dir: PathBuf,
    fsync: bool,
    write_protect: bool,
    read_semaphore: Arc<Semaphore>,
}

impl EventFileStore {
    pub fn new(store_dir: PathBuf, fsync: bool, write_protect: bool) -> Self {
        let degree = (num_cpus::get() * 2).max(1);
        Self {
            store_dir,
            fsync,
            write_protect,
            read_semaphore: Arc::new(Semaphore::new(degree)),
        }
    }

    fn path(&self, position: u64) -> PathBuf {
        paths::event_file_path(&self.store_dir, position)
    }

    /// Writes a brand-new event file. The destination must not already
    /// exist; use [`Self::replace`] for the maintenance rewrite path.
    pub async fn write_new<P: Serialize + Send + Sync>(
        &self,
        event: &SequencedEvent<P>,
    ) -> io::Result<()> {
        self.write(event, false).await
    }

    /// Rewrites an already-committed event file (the `add_tags` maintenance
    /// path): strips the read-only attribute first if the file is
    /// write-protected, then writes and re-applies write-protection.
    pub async fn replace<P: Serialize + Send + Sync>(
        &self,
        event: &SequencedEvent<P>,
    ) -> io::Result<()> {
        self.write(event, true).await
    }

    async fn write<P: Serialize + Send + Sync>(
        &self,
        event: &SequencedEvent<P>,
        is_replace: bool,
    ) -> io::Result<()> {
        let path = self.path(event.position);
        if is_replace && self.write_protect {
            strip_read_only(&path).await?;
        }
        let bytes = serde_json::to_vec(event).expect("event payload is always serializable");
        atomic_file::write_atomic(&path, bytes, self.fsync).await?;
        if self.write_protect {
            set_read_only(&path).await?;
        }
        Ok(())
    }

    /// Reads one event file. Returns [`StoreError::NotFound`] if it does not
    /// exist and [`StoreError::CorruptedPayload`] if it cannot be
    /// deserialized.
    pub async fn read_one<P: DeserializeOwned + Send + 'static>(
        &self,
        position: u64,
    ) -> StoreResult<SequencedEvent<P>> {
        let path = self.path(position);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(position))
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::corrupted_payload(position, source))
    }

    /// Reads many event files, preserving the order of `positions`.
    /// Sequential below [`PARALLEL_READ_THRESHOLD`] positions, otherwise
    /// fanned out across the blocking/async pool bounded by a semaphore
    /// sized `2 x cpu count`.
    pub async fn read_many<P: DeserializeOwned + Send + 'static>(
        &self,
        positions: &[u64],
    ) -> StoreResult<Vec<SequencedEvent<P>>> {
        if positions.len() <= PARALLEL_READ_THRESHOLD {
            let mut out = Vec::with_capacity(positions.len());
            for &position in positions {
                out.push(self.read_one(position).await?);
            }
            return Ok(out);
        }

        let futures = positions.iter().map(|&position| {
            let semaphore = Arc::clone(&self.read_semaphore);
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("read semaphore is never closed");
                self.read_one(position).await
            }
        });
        try_join_all(futures).await
    }
}

async fn strip_read_only(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            let mut permissions = metadata.permissions();
            if permissions.readonly() {
                permissions.set_readonly(false);
                tokio::fs::set_permissions(path, permissions).await?;
            }
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

async fn set_read_only(path: &Path) -> io::Result<()> {
    let metadata = tokio::fs::metadata(path).await?;
    let mut permissions = metadata.permissions();
    permissions.set_readonly(true);
    tokio::fs::set_permissions(path, permissions).await
}
