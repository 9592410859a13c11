//! Shared primitive behind every on-disk structure in this crate: write to a
//! temp file in the destination's directory, optionally fsync, then
//! atomically rename into place. Reads retry a few times on transient
//! sharing errors raised by another writer mid-rename.

use std::io;
use std::path::Path;
use std::time::Duration;

const READ_RETRY_ATTEMPTS: u32 = 5;
const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

/// True for the OS error shapes a concurrent reader sees while another
/// process is mid-rename: `EWOULDBLOCK`/`EAGAIN` on POSIX, sharing/lock
/// violations on Windows. Rust's `io::ErrorKind` maps both onto
/// `WouldBlock`/`PermissionDenied`.
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::PermissionDenied
    )
}

/// Writes `bytes` to `path` atomically: a temp file is created alongside
/// `path` (same directory, so the final rename stays on one filesystem),
/// optionally fsynced, then renamed into place. On any failure after the
/// temp file was created, it is best-effort removed.
pub async fn write_atomic(path: &Path, bytes: Vec<u8>, fsync: bool) -> io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &bytes, fsync))
        .await
        .expect("atomic write task panicked")
}

fn write_atomic_blocking(path: &Path, bytes: &[u8], fsync: bool) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    std::fs::create_dir_all(parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".tmp.")
        .tempfile_in(parent)?;
    std::io::Write::write_all(&mut temp, bytes)?;
    if fsync {
        temp.as_file().sync_all()?;
    }
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Reads `path` whole, retrying a bounded number of times on transient
/// sharing errors. Returns `Ok(None)` if the file does not exist (after the
/// retry budget, a persistent not-found is not transient).
pub async fn read_retrying(path: &Path) -> io::Result<Option<Vec<u8>>> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_retrying_blocking(&path))
        .await
        .expect("atomic read task panicked")
}

fn read_retrying_blocking(path: &Path) -> io::Result<Option<Vec<u8>>> {
    let mut delay = READ_RETRY_DELAY;
    for attempt in 0..READ_RETRY_ATTEMPTS {
        match std::fs::read(path) {
            Ok(bytes) => return Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) if is_transient(&err) && attempt + 1 < READ_RETRY_ATTEMPTS => {
                std::thread::sleep(delay);
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
    unreachable!("loop always returns or retries within its bound")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("value.json");
        write_atomic(&path, b"hello".to_vec(), true).await.unwrap();
        let bytes = read_retrying(&path).await.unwrap().unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn read_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(read_retrying(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_atomic_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("value.json");
        write_atomic(&path, b"old".to_vec(), false).await.unwrap();
        write_atomic(&path, b"new".to_vec(), false).await.unwrap();
        let bytes = read_retrying(&path).await.unwrap().unwrap();
        assert_eq!(bytes, b"new");
    }
}
