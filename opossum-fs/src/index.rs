//! `TypeIndex` and `TagIndex`: the two secondary indices, both backed by the
//! same uniform shape over [`crate::position_index`] — one sorted-position
//! file per key, all writes serialized through a single in-process mutex.
//!
//! The per-index mutex is the in-process concurrency mechanism; coordination
//! across processes is the [`crate::cross_process_lock::CrossProcessLock`]
//! held by the `Store` facade around the whole append critical section.

use std::io;
use std::path::PathBuf;

use opossum_core::Tag;
use tokio::sync::Mutex;

use crate::paths::sanitize_segment;
use crate::position_index;

/// A sorted-position-list index keyed by an arbitrary string, read-modify-
/// written under one mutex per index instance.
struct KeyedIndex {
    dir: PathBuf,
    fsync: bool,
    write_lock: Mutex<()>,
}

impl KeyedIndex {
    fn new(dir: PathBuf, fsync: bool) -> Self {
        Self {
            dir,
            fsync,
            write_lock: Mutex::new(()),
        }
    }

    /// Inserts `position` under `file_stem`, returning whether it was newly
    /// added (false if already present — a silent no-op per the spec).
    async fn add(&self, file_stem: &str, position: u64) -> io::Result<bool> {
        let _guard = self.write_lock.lock().await;
        let path = position_index::path_for_directory_and_stem(&self.dir, file_stem);
        position_index::insert_position(&path, position, self.fsync).await
    }

    async fn get(&self, file_stem: &str) -> io::Result<Vec<u64>> {
        let path = position_index::path_for_directory_and_stem(&self.dir, file_stem);
        position_index::read_positions(&path).await
    }

    async fn exists(&self, file_stem: &str) -> bool {
        position_index::exists(&position_index::path_for_directory_and_stem(
            &self.dir, file_stem,
        ))
        .await
    }
}

/// Maps event-type names to the positions of events carrying that type.
pub struct TypeIndex {
    inner: KeyedIndex,
}

impl TypeIndex {
    pub fn new(dir: PathBuf, fsync: bool) -> Self {
        Self {
            inner: KeyedIndex::new(dir, fsync),
        }
    }

    pub async fn add(&self, event_type: &str, position: u64) -> io::Result<bool> {
        self.inner.add(&sanitize_segment(event_type), position).await
    }

    pub async fn get(&self, event_type: &str) -> io::Result<Vec<u64>> {
        self.inner.get(&sanitize_segment(event_type)).await
    }

    pub async fn exists(&self, event_type: &str) -> bool {
        self.inner.exists(&sanitize_segment(event_type)).await
    }
}

/// Maps `(key, value)` tag pairs to the positions of events carrying that tag.
pub struct TagIndex {
    inner: KeyedIndex,
}

impl TagIndex {
    pub fn new(dir: PathBuf, fsync: bool) -> Self {
        Self {
            inner: KeyedIndex::new(dir, fsync),
        }
    }

    fn file_stem(tag: &Tag) -> String {
        format!(
            "{}_{}",
            sanitize_segment(&tag.key),
            sanitize_segment(&tag.value)
        )
    }

    pub async fn add(&self, tag: &Tag, position: u64) -> io::Result<bool> {
        self.inner.add(&Self::file_stem(tag), position).await
    }

    pub async fn get(&self, tag: &Tag) -> io::Result<Vec<u64>> {
        self.inner.get(&Self::file_stem(tag)).await
    }

    pub async fn exists(&self, tag: &Tag) -> bool {
        self.inner.exists(&Self::file_stem(tag)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn type_index_add_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let index = TypeIndex::new(dir.path().to_path_buf(), true);
        assert!(index.add("Created", 1).await.unwrap());
        assert!(index.add("Created", 2).await.unwrap());
        assert!(!index.add("Created", 1).await.unwrap());
        assert_eq!(index.get("Created").await.unwrap(), vec![1, 2]);
        assert!(index.exists("Created").await);
        assert!(!index.exists("Other").await);
    }

    #[tokio::test]
    async fn tag_index_keys_by_key_and_value() {
        let dir = tempfile::tempdir().unwrap();
        let index = TagIndex::new(dir.path().to_path_buf(), false);
        let tag = Tag::new("courseId", "math/101");
        assert!(index.add(&tag, 7).await.unwrap());
        assert_eq!(index.get(&tag).await.unwrap(), vec![7]);
        assert_eq!(
            index.get(&Tag::new("courseId", "other")).await.unwrap(),
            Vec::<u64>::new()
        );
    }
}
