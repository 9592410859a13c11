//! The single public entry point of the storage engine: `append`, `read`,
//! `read_last`, `delete_store`, and the `add_tags` maintenance operation.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::condition::AppendCondition;
use crate::errors::StoreResult;
use crate::event::{NewEvent, SequencedEvent};
use crate::maintenance::{TagFactory, TagMigrationResult};
use crate::query::{Query, ReadOptions};

/// The storage engine facade. Implementations own the ledger, the secondary
/// indices, and the in-process append mutex; every method either fully
/// succeeds (all side effects present and durable per the configured flush
/// policy) or returns a [`crate::errors::StoreError`] with no partial commit
/// visible to readers.
///
/// `P` is the application's event payload type; see the "polymorphic event
/// payloads" design note for why the engine is generic over it rather than
/// fixing a concrete payload enum.
#[async_trait]
pub trait EventStore<P>: Send + Sync
where
    P: Send + Sync + 'static,
{
    /// Appends a non-empty batch of events, assigning them contiguous
    /// positions in caller order. If `condition` is supplied, it is
    /// evaluated inside the append critical section and the whole batch is
    /// rejected (with no positions consumed) if it fails.
    async fn append(
        &self,
        events: Vec<NewEvent<P>>,
        condition: Option<AppendCondition>,
        cancellation: CancellationToken,
    ) -> StoreResult<Vec<SequencedEvent<P>>>;

    /// Resolves `query` against the indices, optionally reversing order and
    /// filtering to positions strictly greater than `from_position`, then
    /// reads the matching event files.
    async fn read(
        &self,
        query: Query,
        options: ReadOptions,
        from_position: Option<u64>,
        cancellation: CancellationToken,
    ) -> StoreResult<Vec<SequencedEvent<P>>>;

    /// Returns the single highest-position event matching `query`, reading
    /// at most one event file regardless of how many positions match.
    async fn read_last(
        &self,
        query: Query,
        cancellation: CancellationToken,
    ) -> StoreResult<Option<SequencedEvent<P>>>;

    /// Tears down the entire store directory. The directory is recreated
    /// lazily on the next operation.
    async fn delete_store(&self) -> StoreResult<()>;

    /// For every committed event of `event_type`, proposes new tags via
    /// `tag_factory` and additively merges them in (first-wins on key
    /// collision with tags already present). Never removes or modifies an
    /// existing tag, payload, or event type.
    async fn add_tags(
        &self,
        event_type: &str,
        tag_factory: &(dyn TagFactory<P> + Send + Sync),
        cancellation: CancellationToken,
    ) -> StoreResult<TagMigrationResult>;
}
