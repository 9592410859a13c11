//! OS-level exclusive lock over `.store.lock`, serializing appends across
//! every process (including other machines on a shared network mount) that
//! opens the same store directory.
//!
//! Acquisition uses bounded exponential backoff: 10ms initial, doubling,
//! capped at 500ms, bounded in total by the configured timeout. The
//! underlying lock primitive ([`fslock::LockFile`]) is synchronous, so each
//! attempt runs on the blocking thread pool; crashed holders are cleaned up
//! by the OS releasing the file handle, so there is no stale-lock recovery
//! path to implement.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use opossum_core::StoreError;
use tokio_util::sync::CancellationToken;

const INITIAL_BACKOFF: Duration = Duration::from_millis(10);
const MAX_BACKOFF: Duration = Duration::from_millis(500);

fn to_io_error(err: fslock::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err)
}

pub struct CrossProcessLock {
    path: PathBuf,
}

/// A held lock. Dropping it releases the OS-level exclusive lock (the
/// underlying `fslock::LockFile` unlocks and closes its handle on drop).
pub struct LockGuard {
    // Only ever `None` immediately after being taken apart for a
    // `spawn_blocking` call; always `Some` for the guard's visible lifetime.
    file: Option<fslock::LockFile>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // `fslock::LockFile::drop` already unlocks; dropping `file` here is
        // enough. Spelled out so the intent is visible at the call site.
        self.file.take();
    }
}

impl CrossProcessLock {
    pub fn new(store_dir: &Path) -> Self {
        Self {
            path: crate::paths::lock_path(store_dir),
        }
    }

    /// Acquires the lock, retrying with exponential backoff until either it
    /// succeeds, `timeout` elapses (-> [`StoreError::LockTimeout`]), or
    /// `cancellation` fires (-> [`StoreError::Cancelled`]).
    pub async fn acquire(
        &self,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> Result<LockGuard, StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let path = self.path.clone();
        let mut lock_file = tokio::task::spawn_blocking(move || fslock::LockFile::open(&path))
            .await
            .expect("lock open task panicked")
            .map_err(to_io_error)?;

        let deadline = Instant::now() + timeout;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            if cancellation.is_cancelled() {
                return Err(StoreError::Cancelled);
            }

            let (returned, acquired) = tokio::task::spawn_blocking(move || {
                let acquired = lock_file.try_lock();
                (lock_file, acquired)
            })
            .await
            .expect("lock attempt task panicked");
            lock_file = returned;
            if acquired.map_err(to_io_error)? {
                return Ok(LockGuard {
                    file: Some(lock_file),
                });
            }

            if Instant::now() >= deadline {
                return Err(StoreError::lock_timeout(self.path.display().to_string()));
            }

            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = cancellation.cancelled() => return Err(StoreError::Cancelled),
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquires_uncontended_lock() {
        let dir = tempfile::tempdir().unwrap();
        let lock = CrossProcessLock::new(dir.path());
        let token = CancellationToken::new();
        let guard = lock
            .acquire(Duration::from_secs(1), &token)
            .await
            .unwrap();
        drop(guard);
    }

    #[tokio::test]
    async fn second_attempt_times_out_while_first_holds_lock() {
        let dir = tempfile::tempdir().unwrap();
        let lock_a = CrossProcessLock::new(dir.path());
        let lock_b = CrossProcessLock::new(dir.path());
        let token = CancellationToken::new();

        let _guard = lock_a
            .acquire(Duration::from_secs(1), &token)
            .await
            .unwrap();

        let result = lock_b.acquire(Duration::from_millis(100), &token).await;
        assert!(matches!(result, Err(StoreError::LockTimeout { .. })));
    }

    #[tokio::test]
    async fn cancellation_is_reported_instead_of_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let lock_a = CrossProcessLock::new(dir.path());
        let lock_b = CrossProcessLock::new(dir.path());
        let token = CancellationToken::new();

        let _guard = lock_a
            .acquire(Duration::from_secs(5), &token)
            .await
            .unwrap();

        let cancel_token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_token.cancel();
        });

        let result = lock_b.acquire(Duration::from_secs(5), &token).await;
        assert!(matches!(result, Err(StoreError::Cancelled)));
    }
}
