//! Domain types, the typed error surface, and the `EventStore` trait shared
//! by every Opossum storage backend.
//!
//! This crate has no opinion on *how* events are persisted — that's the job
//! of a backend crate such as `opossum-fs`. It only defines what a backend
//! must accept and return.

pub mod condition;
pub mod errors;
pub mod event;
pub mod maintenance;
pub mod query;
pub mod store_trait;

pub use condition::AppendCondition;
pub use errors::{StoreError, StoreResult};
pub use event::{dedupe_tags_first_wins, EventMetadata, NewEvent, SequencedEvent, Tag};
pub use maintenance::{TagFactory, TagMigrationResult};
pub use query::{Query, QueryItem, ReadOptions};
pub use store_trait::EventStore;
