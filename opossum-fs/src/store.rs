//! The filesystem-backed [`EventStore`] facade: the single place that
//! orders the append critical section and wires together the ledger, the
//! secondary indices, the cross-process lock, and event file I/O.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use opossum_core::{
    AppendCondition, EventStore, NewEvent, Query, ReadOptions, SequencedEvent, StoreError,
    StoreResult, Tag, TagFactory, TagMigrationResult,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::append_condition::AppendConditionChecker;
use crate::config::StoreConfig;
use crate::event_file::EventFileStore;
use crate::index_coordinator::IndexCoordinator;
use crate::cross_process_lock::CrossProcessLock;
use crate::ledger::Ledger;
use crate::query_evaluator::QueryEvaluator;

/// Owns every component of one filesystem-backed store directory and
/// implements [`EventStore`] over it.
///
/// `append` serializes through two layers: an in-process
/// `tokio::sync::Mutex` (fair FIFO, so concurrent in-process callers don't
/// starve) and then the machine-wide [`CrossProcessLock`]. Both are held for
/// the entire critical section described in the append data-flow diagram.
pub struct Store<P> {
    config: StoreConfig,
    store_dir: PathBuf,
    ledger: Ledger,
    index: IndexCoordinator,
    cross_process_lock: CrossProcessLock,
    event_files: EventFileStore,
    append_mutex: AsyncMutex<()>,
    _payload: std::marker::PhantomData<fn() -> P>,
}

impl<P> Store<P>
where
    P: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(config: StoreConfig) -> Self {
        let store_dir = config.store_dir();
        let ledger = Ledger::new(&store_dir, config.flush_immediately);
        let index = IndexCoordinator::new(&store_dir, config.fsync_indices);
        let cross_process_lock = CrossProcessLock::new(&store_dir);
        let event_files = EventFileStore::new(
            store_dir.clone(),
            config.flush_immediately,
            config.write_protect_event_files,
        );
        Self {
            config,
            store_dir,
            ledger,
            index,
            cross_process_lock,
            event_files,
            append_mutex: AsyncMutex::new(()),
            _payload: std::marker::PhantomData,
        }
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }
}

#[async_trait]
impl<P> EventStore<P> for Store<P>
where
    P: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    #[instrument(skip(self, events, condition, cancellation), fields(store = %self.config.store_name, count = events.len()))]
    async fn append(
        &self,
        events: Vec<NewEvent<P>>,
        condition: Option<AppendCondition>,
        cancellation: CancellationToken,
    ) -> StoreResult<Vec<SequencedEvent<P>>> {
        if events.is_empty() {
            return Err(StoreError::invalid("append requires at least one event"));
        }
        if events.iter().any(|event| event.event_type.trim().is_empty()) {
            return Err(StoreError::invalid("event_type must not be empty"));
        }

        let _append_guard = self.append_mutex.lock().await;
        if cancellation.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let _lock_guard = self
            .cross_process_lock
            .acquire(self.config.cross_process_lock_timeout, &cancellation)
            .await?;

        let current = self.ledger.current().await?;

        if let Some(condition) = &condition {
            AppendConditionChecker::new(&self.index, &self.ledger)
                .check(condition, current)
                .await?;
        }

        let sequenced: Vec<SequencedEvent<P>> = events
            .into_iter()
            .enumerate()
            .map(|(offset, event)| SequencedEvent::from_new(event, current + 1 + offset as u64))
            .collect();

        for event in &sequenced {
            self.event_files.write_new(event).await?;
        }
        for event in &sequenced {
            self.index.add_event(event).await?;
        }

        let new_ledger_value = current + sequenced.len() as u64;
        self.ledger.advance(new_ledger_value).await?;

        tracing::debug!(new_ledger_value, "append committed");
        Ok(sequenced)
    }

    #[instrument(skip(self, query, cancellation), fields(store = %self.config.store_name))]
    async fn read(
        &self,
        query: Query,
        options: ReadOptions,
        from_position: Option<u64>,
        cancellation: CancellationToken,
    ) -> StoreResult<Vec<SequencedEvent<P>>> {
        let evaluator = QueryEvaluator::new(&self.index, &self.ledger);
        let mut positions = evaluator.evaluate(&query, from_position).await?;
        if positions.is_empty() {
            return Ok(Vec::new());
        }
        if options.descending {
            positions.reverse();
        }
        if cancellation.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        self.event_files.read_many(&positions).await
    }

    #[instrument(skip(self, query, cancellation), fields(store = %self.config.store_name))]
    async fn read_last(
        &self,
        query: Query,
        cancellation: CancellationToken,
    ) -> StoreResult<Option<SequencedEvent<P>>> {
        let evaluator = QueryEvaluator::new(&self.index, &self.ledger);
        let positions = evaluator.evaluate(&query, None).await?;
        let Some(&last) = positions.iter().max() else {
            return Ok(None);
        };
        if cancellation.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        self.event_files.read_one(last).await.map(Some)
    }

    #[instrument(skip(self), fields(store = %self.config.store_name))]
    async fn delete_store(&self) -> StoreResult<()> {
        let _append_guard = self.append_mutex.lock().await;
        if tokio::fs::metadata(&self.store_dir).await.is_err() {
            return Ok(());
        }
        strip_read_only_recursively(&self.store_dir).await?;
        tokio::fs::remove_dir_all(&self.store_dir).await?;
        Ok(())
    }

    #[instrument(skip(self, tag_factory, cancellation), fields(store = %self.config.store_name))]
    async fn add_tags(
        &self,
        event_type: &str,
        tag_factory: &(dyn TagFactory<P> + Send + Sync),
        cancellation: CancellationToken,
    ) -> StoreResult<TagMigrationResult> {
        let _append_guard = self.append_mutex.lock().await;

        let positions = self.index.positions_by_type(event_type).await?;
        let mut result = TagMigrationResult::default();

        for position in positions {
            if cancellation.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            let mut event: SequencedEvent<P> = self.event_files.read_one(position).await?;
            let proposed = tag_factory.propose_tags(
                event.position,
                &event.event_type,
                &event.payload,
                &event.tags,
            );
            let existing_keys: std::collections::HashSet<&str> =
                event.tags.iter().map(|tag| tag.key.as_str()).collect();
            let new_tags: Vec<Tag> = opossum_core::dedupe_tags_first_wins(&proposed)
                .into_iter()
                .filter(|tag| !existing_keys.contains(tag.key.as_str()))
                .collect();

            result.record(new_tags.len());
            if new_tags.is_empty() {
                continue;
            }

            event.tags.extend(new_tags.iter().cloned());
            self.event_files.replace(&event).await?;
            for tag in &new_tags {
                self.index.add_tag(tag, event.position).await?;
            }
        }

        Ok(result)
    }
}

/// Walks `dir` depth-first, clearing the read-only attribute from every file
/// found, so the subsequent `remove_dir_all` can't be blocked by
/// write-protected event files. Implemented as an explicit work queue rather
/// than async recursion (async fns can't recurse without boxing).
async fn strip_read_only_recursively(dir: &Path) -> std::io::Result<()> {
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(path);
            } else {
                let metadata = entry.metadata().await?;
                let mut permissions = metadata.permissions();
                if permissions.readonly() {
                    permissions.set_readonly(false);
                    tokio::fs::set_permissions(&path, permissions).await?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opossum_core::QueryItem;

    fn config(dir: &Path) -> StoreConfig {
        StoreConfig::new(dir, "courses").unwrap()
    }

    #[tokio::test]
    async fn append_assigns_contiguous_positions_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::<String>::new(config(dir.path()));
        let events = vec![
            NewEvent::new("Created", "a".to_string()),
            NewEvent::new("Created", "b".to_string()),
        ];
        let sequenced = store
            .append(events, None, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(sequenced[0].position, 1);
        assert_eq!(sequenced[1].position, 2);
    }

    #[tokio::test]
    async fn read_round_trips_appended_events() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::<String>::new(config(dir.path()));
        store
            .append(
                vec![NewEvent::new("Created", "payload".to_string())],
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let events = store
            .read(
                Query::match_all(),
                ReadOptions::default(),
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload, "payload");
    }

    #[tokio::test]
    async fn append_condition_rejects_stale_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::<String>::new(config(dir.path()));
        store
            .append(
                vec![NewEvent::new("Created", "a".to_string())],
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let result = store
            .append(
                vec![NewEvent::new("Created", "b".to_string())],
                Some(AppendCondition::none().with_after_sequence_position(0)),
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(StoreError::ConcurrencyConflict { .. })));
    }

    #[tokio::test]
    async fn read_last_reads_only_the_highest_matching_position() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::<String>::new(config(dir.path()));
        for payload in ["a", "b", "c"] {
            store
                .append(
                    vec![NewEvent::new("Created", payload.to_string())],
                    None,
                    CancellationToken::new(),
                )
                .await
                .unwrap();
        }
        let last = store
            .read_last(Query::match_all(), CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.position, 3);
        assert_eq!(last.payload, "c");
    }

    #[tokio::test]
    async fn delete_store_removes_directory_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::<String>::new(config(dir.path()));
        store
            .append(
                vec![NewEvent::new("Created", "a".to_string())],
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        store.delete_store().await.unwrap();
        assert!(tokio::fs::metadata(store.store_dir()).await.is_err());
        store.delete_store().await.unwrap();
    }

    #[tokio::test]
    async fn add_tags_is_additive_and_first_wins_on_existing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::<String>::new(config(dir.path()));
        store
            .append(
                vec![NewEvent::new("Enrolled", "s1".to_string()).with_tag(Tag::new("studentId", "s1"))],
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let factory = |_position: u64, _event_type: &str, _payload: &String, _existing: &[Tag]| {
            vec![
                Tag::new("studentId", "should-not-override"),
                Tag::new("cohort", "2026"),
            ]
        };
        let result = store
            .add_tags("Enrolled", &factory, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.events_scanned, 1);
        assert_eq!(result.events_modified, 1);
        assert_eq!(result.tags_added, 1);

        let events = store
            .read(
                Query::single(QueryItem::new().with_tags([Tag::new("cohort", "2026")])),
                ReadOptions::default(),
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0]
                .tags
                .iter()
                .find(|tag| tag.key == "studentId")
                .unwrap()
                .value,
            "s1"
        );
    }
}
