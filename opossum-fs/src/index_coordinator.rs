//! Fans an event's type and tags into the appropriate index files on write,
//! and provides the parallel multi-index lookups the query evaluator needs
//! on read.

use std::io;
use std::path::Path;

use futures::future::try_join_all;
use opossum_core::{SequencedEvent, Tag};

use crate::index::{TagIndex, TypeIndex};
use crate::paths;

pub struct IndexCoordinator {
    type_index: TypeIndex,
    tag_index: TagIndex,
}

impl IndexCoordinator {
    pub fn new(store_dir: &Path, fsync: bool) -> Self {
        Self {
            type_index: TypeIndex::new(paths::event_type_index_dir(store_dir), fsync),
            tag_index: TagIndex::new(paths::tag_index_dir(store_dir), fsync),
        }
    }

    /// Registers a committed event's type and every one of its (already
    /// deduplicated) tags. Order matches the spec: type index first, then
    /// tags in declaration order.
    pub async fn add_event<P>(&self, event: &SequencedEvent<P>) -> io::Result<()> {
        self.type_index.add(&event.event_type, event.position).await?;
        for tag in &event.tags {
            self.tag_index.add(tag, event.position).await?;
        }
        Ok(())
    }

    pub async fn positions_by_type(&self, event_type: &str) -> io::Result<Vec<u64>> {
        self.type_index.get(event_type).await
    }

    /// Positions carrying any of `types` (OR), deduplicated and sorted.
    pub async fn positions_by_types(&self, types: &[String]) -> io::Result<Vec<u64>> {
        match types {
            [] => Ok(Vec::new()),
            [single] => self.positions_by_type(single).await,
            many => {
                let lists = try_join_all(many.iter().map(|t| self.positions_by_type(t))).await?;
                Ok(merge_sorted_lists(lists))
            }
        }
    }

    pub async fn positions_by_tag(&self, tag: &Tag) -> io::Result<Vec<u64>> {
        self.tag_index.get(tag).await
    }

    /// Registers a single tag for an already-committed event. Used by the
    /// `add_tags` maintenance path, which only ever adds new tags — the
    /// event's type is immutable, so the type index is never touched here.
    pub async fn add_tag(&self, tag: &Tag, position: u64) -> io::Result<bool> {
        self.tag_index.add(tag, position).await
    }

    /// Positions carrying any of `tags` (OR across the list — callers that
    /// want an AND of tags call this once per tag and intersect the
    /// results themselves; see [`crate::query_evaluator`]).
    pub async fn positions_by_tags(&self, tags: &[Tag]) -> io::Result<Vec<u64>> {
        match tags {
            [] => Ok(Vec::new()),
            [single] => self.positions_by_tag(single).await,
            many => {
                let lists = try_join_all(many.iter().map(|t| self.positions_by_tag(t))).await?;
                Ok(merge_sorted_lists(lists))
            }
        }
    }
}

/// O(N·K) k-way merge of already-sorted lists into one sorted, deduplicated
/// list. Deliberately not a re-sort or a hash-set union: the spec calls out
/// that both would lose the linear-time sorted-merge guarantee this
/// component exists to provide.
fn merge_sorted_lists(lists: Vec<Vec<u64>>) -> Vec<u64> {
    let mut cursors = vec![0usize; lists.len()];
    let mut merged = Vec::new();
    loop {
        let mut candidate: Option<u64> = None;
        for (list, cursor) in lists.iter().zip(cursors.iter()) {
            if let Some(&value) = list.get(*cursor) {
                candidate = Some(candidate.map_or(value, |current| current.min(value)));
            }
        }
        let Some(min_value) = candidate else {
            break;
        };
        for (list, cursor) in lists.iter().zip(cursors.iter_mut()) {
            if list.get(*cursor) == Some(&min_value) {
                *cursor += 1;
            }
        }
        merged.push(min_value);
    }
    merged
}
