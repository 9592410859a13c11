//! The query algebra: an OR of [`QueryItem`]s, each an OR-of-types AND-of-tags
//! predicate. Used both for reads and, embedded in an [`crate::condition::AppendCondition`],
//! for optimistic-concurrency checks.

use serde::{Deserialize, Serialize};

use crate::event::Tag;

/// One clause of a [`Query`]: matches events whose type is one of `types`
/// (OR'd, or any type if empty) AND that carry every tag in `tags` (AND'd, or
/// no tag requirement if empty). When both are present, the match is their
/// intersection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryItem {
    pub types: Vec<String>,
    pub tags: Vec<Tag>,
}

impl QueryItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.tags.is_empty()
    }
}

/// An OR-of-[`QueryItem`]s. An empty query (no items) matches every event
/// ("match all").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub items: Vec<QueryItem>,
}

impl Query {
    /// The "match all" query: no items, matches every committed event.
    pub fn match_all() -> Self {
        Self { items: Vec::new() }
    }

    pub fn of(items: impl IntoIterator<Item = QueryItem>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    pub fn single(item: QueryItem) -> Self {
        Self { items: vec![item] }
    }

    pub fn for_type(event_type: impl Into<String>) -> Self {
        Self::single(QueryItem::new().with_types([event_type.into()]))
    }

    pub fn for_tag(tag: Tag) -> Self {
        Self::single(QueryItem::new().with_tags([tag]))
    }

    pub fn is_match_all(&self) -> bool {
        self.items.is_empty()
    }
}

/// Read-time options independent of the query predicate itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOptions {
    /// If true, results are returned in descending position order.
    pub descending: bool,
}

impl ReadOptions {
    pub fn descending() -> Self {
        Self { descending: true }
    }
}
