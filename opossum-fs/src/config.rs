//! Filesystem-backend configuration. Plain data — no environment or file
//! parsing here; that belongs to whatever embeds this crate (the CLI binary
//! reads it from `clap` arguments).

use std::path::PathBuf;
use std::time::Duration;

use opossum_core::{StoreError, StoreResult};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory under which every store's subdirectory is created.
    pub root_path: PathBuf,
    /// Name of this store; becomes the leaf directory under `root_path`.
    pub store_name: String,
    /// Fsync event files, indices, and the ledger before considering a
    /// write durable. Defaults to `true`; disabling trades durability for
    /// throughput.
    pub flush_immediately: bool,
    /// Total deadline for acquiring the cross-process lock.
    pub cross_process_lock_timeout: Duration,
    /// Mark committed event files read-only on disk.
    pub write_protect_event_files: bool,
    /// Fsync index files in addition to event files and the ledger.
    pub fsync_indices: bool,
}

impl StoreConfig {
    pub fn new(root_path: impl Into<PathBuf>, store_name: impl Into<String>) -> StoreResult<Self> {
        let config = Self {
            root_path: root_path.into(),
            store_name: store_name.into(),
            flush_immediately: true,
            cross_process_lock_timeout: DEFAULT_LOCK_TIMEOUT,
            write_protect_event_files: false,
            fsync_indices: false,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_flush_immediately(mut self, flush_immediately: bool) -> Self {
        self.flush_immediately = flush_immediately;
        self
    }

    pub fn with_cross_process_lock_timeout(mut self, timeout: Duration) -> Self {
        self.cross_process_lock_timeout = timeout;
        self
    }

    pub fn with_write_protect_event_files(mut self, write_protect: bool) -> Self {
        self.write_protect_event_files = write_protect;
        self
    }

    pub fn with_fsync_indices(mut self, fsync_indices: bool) -> Self {
        self.fsync_indices = fsync_indices;
        self
    }

    pub fn store_dir(&self) -> PathBuf {
        self.root_path.join(&self.store_name)
    }

    fn validate(&self) -> StoreResult<()> {
        if self.store_name.trim().is_empty() {
            return Err(StoreError::invalid("store_name must not be empty"));
        }
        if self
            .store_name
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0')
        {
            return Err(StoreError::invalid(
                "store_name must not contain path separators",
            ));
        }
        if !self.root_path.is_absolute() {
            return Err(StoreError::invalid("root_path must be absolute"));
        }
        if self.cross_process_lock_timeout.is_zero() {
            return Err(StoreError::invalid(
                "cross_process_lock_timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}
