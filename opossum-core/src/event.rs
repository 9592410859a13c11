//! Event definitions: the input ("new") and stored ("sequenced") forms of an
//! event, plus tags and metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A `(key, value)` pair attached to an event for secondary indexing.
///
/// Keys are opaque identifiers (e.g. `courseId`); on a single event, keys are
/// expected to be unique — callers that supply duplicate keys get "first
/// wins" behavior, consistently between append and the `add_tags`
/// maintenance path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// System-level information carried alongside every event, independent of
/// its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// When the event occurred. Filled with UTC-now at append time if the
    /// caller did not set one; never mutated once assigned.
    pub timestamp: DateTime<Utc>,
    /// Optional correlation id for tracing related events across a workflow.
    pub correlation_id: Option<Uuid>,
    /// Optional causation id: the event (if any) that directly caused this one.
    pub causation_id: Option<Uuid>,
}

impl EventMetadata {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            correlation_id: None,
            causation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_causation_id(mut self, causation_id: Uuid) -> Self {
        self.causation_id = Some(causation_id);
        self
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::now()
    }
}

/// An application-provided event the store has not yet sequenced.
///
/// `P` is the caller's payload type. The store is generic over it — it only
/// needs `Serialize + DeserializeOwned` to round-trip it to JSON; see the
/// module docs on "polymorphic event payloads" in `SPEC_FULL.md` §9 for why
/// this crate doesn't bake in a fixed payload enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent<P> {
    pub event_type: String,
    pub payload: P,
    pub tags: Vec<Tag>,
    pub metadata: Option<EventMetadata>,
}

impl<P> NewEvent<P> {
    pub fn new(event_type: impl Into<String>, payload: P) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            tags: Vec::new(),
            metadata: None,
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Tags with first-wins deduplication by key, applied in declaration order.
    pub fn deduplicated_tags(&self) -> Vec<Tag> {
        dedupe_tags_first_wins(&self.tags)
    }
}

/// Discards tags whose key has already appeared earlier in the slice.
pub fn dedupe_tags_first_wins(tags: &[Tag]) -> Vec<Tag> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(tags.len());
    for tag in tags {
        if seen.insert(tag.key.clone()) {
            out.push(tag.clone());
        }
    }
    out
}

/// A [`NewEvent`] plus the globally assigned, strictly-positive position.
///
/// All store reads return this form. Once written, an event's payload, type
/// and position never change; only its tag set may grow via `add_tags`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencedEvent<P> {
    pub position: u64,
    pub event_type: String,
    pub payload: P,
    pub tags: Vec<Tag>,
    pub metadata: EventMetadata,
}

impl<P> SequencedEvent<P> {
    pub fn from_new(new_event: NewEvent<P>, position: u64) -> Self {
        assert!(position >= 1, "positions are 1-based");
        Self {
            position,
            event_type: new_event.event_type,
            payload: new_event.payload,
            tags: dedupe_tags_first_wins(&new_event.tags),
            metadata: new_event.metadata.unwrap_or_default(),
        }
    }
}
