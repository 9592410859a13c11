//! Turns a [`Query`] into the concrete, sorted, deduplicated list of
//! positions it matches, against the current state of the secondary indices
//! and the ledger.

use std::io;

use opossum_core::{Query, QueryItem};

use crate::index_coordinator::IndexCoordinator;
use crate::ledger::Ledger;

pub struct QueryEvaluator<'a> {
    index: &'a IndexCoordinator,
    ledger: &'a Ledger,
}

impl<'a> QueryEvaluator<'a> {
    pub fn new(index: &'a IndexCoordinator, ledger: &'a Ledger) -> Self {
        Self { index, ledger }
    }

    /// Resolves `query` to a sorted, deduplicated list of positions,
    /// restricted to those strictly greater than `from_position` when set.
    pub async fn evaluate(
        &self,
        query: &Query,
        from_position: Option<u64>,
    ) -> io::Result<Vec<u64>> {
        let floor = from_position.unwrap_or(0);

        if query.is_match_all() {
            let last = self.ledger.current().await?;
            let start = floor.saturating_add(1).max(1);
            if start > last {
                return Ok(Vec::new());
            }
            return Ok((start..=last).collect());
        }

        let mut matched = Vec::new();
        for item in &query.items {
            let positions = self.evaluate_item(item).await?;
            matched = union_sorted(matched, positions);
        }

        if from_position.is_some() {
            matched.retain(|&position| position > floor);
        }
        Ok(matched)
    }

    /// A single [`QueryItem`]'s match set: the intersection of "carries one
    /// of these types" and "carries one of these tags" when both are
    /// present, or whichever side is present, or nothing for an empty item.
    async fn evaluate_item(&self, item: &QueryItem) -> io::Result<Vec<u64>> {
        if item.is_empty() {
            return Ok(Vec::new());
        }
        match (item.types.is_empty(), item.tags.is_empty()) {
            (true, true) => Ok(Vec::new()),
            (false, true) => self.index.positions_by_types(&item.types).await,
            (true, false) => self.index.positions_by_tags(&item.tags).await,
            (false, false) => {
                let by_type = self.index.positions_by_types(&item.types).await?;
                let by_tag = self.index.positions_by_tags(&item.tags).await?;
                Ok(intersect_sorted(&by_type, &by_tag))
            }
        }
    }
}

/// Sorted union of two already-sorted, deduplicated lists.
fn union_sorted(a: Vec<u64>, b: Vec<u64>) -> Vec<u64> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                merged.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                merged.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                merged.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    merged.extend_from_slice(&a[i..]);
    merged.extend_from_slice(&b[j..]);
    merged
}

/// Sorted intersection of two already-sorted, deduplicated lists.
fn intersect_sorted(a: &[u64], b: &[u64]) -> Vec<u64> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use opossum_core::{EventMetadata, SequencedEvent, Tag};

    async fn seeded(dir: &std::path::Path) -> (IndexCoordinator, Ledger) {
        let index = IndexCoordinator::new(dir, true);
        let ledger = Ledger::new(dir, true);
        for (position, event_type, tag_value) in
            [(1u64, "Created", "a"), (2, "Renamed", "a"), (3, "Created", "b")]
        {
            let event = SequencedEvent {
                position,
                event_type: event_type.to_string(),
                payload: (),
                tags: vec![Tag::new("course", tag_value)],
                metadata: EventMetadata::now(),
            };
            index.add_event(&event).await.unwrap();
        }
        ledger.advance(3).await.unwrap();
        (index, ledger)
    }

    #[tokio::test]
    async fn match_all_returns_full_contiguous_range() {
        let dir = tempfile::tempdir().unwrap();
        let (index, ledger) = seeded(dir.path()).await;
        let evaluator = QueryEvaluator::new(&index, &ledger);
        let positions = evaluator.evaluate(&Query::match_all(), None).await.unwrap();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn match_all_respects_from_position() {
        let dir = tempfile::tempdir().unwrap();
        let (index, ledger) = seeded(dir.path()).await;
        let evaluator = QueryEvaluator::new(&index, &ledger);
        let positions = evaluator
            .evaluate(&Query::match_all(), Some(1))
            .await
            .unwrap();
        assert_eq!(positions, vec![2, 3]);
    }

    #[tokio::test]
    async fn type_and_tag_intersection_narrows_to_matching_events() {
        let dir = tempfile::tempdir().unwrap();
        let (index, ledger) = seeded(dir.path()).await;
        let evaluator = QueryEvaluator::new(&index, &ledger);
        let query = Query::single(
            QueryItem::new()
                .with_types(["Created".to_string()])
                .with_tags([Tag::new("course", "a")]),
        );
        let positions = evaluator.evaluate(&query, None).await.unwrap();
        assert_eq!(positions, vec![1]);
    }

    #[tokio::test]
    async fn multiple_items_union_their_match_sets() {
        let dir = tempfile::tempdir().unwrap();
        let (index, ledger) = seeded(dir.path()).await;
        let evaluator = QueryEvaluator::new(&index, &ledger);
        let query = Query::of([
            QueryItem::new().with_types(["Renamed".to_string()]),
            QueryItem::new().with_tags([Tag::new("course", "b")]),
        ]);
        let positions = evaluator.evaluate(&query, None).await.unwrap();
        assert_eq!(positions, vec![2, 3]);
    }
}
