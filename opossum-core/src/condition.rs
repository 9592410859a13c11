//! The optimistic-concurrency guard evaluated inside the append critical
//! section — the "Dynamic Consistency Boundary" (DCB) primitive.

use serde::{Deserialize, Serialize};

use crate::query::Query;

/// Guards an `append` against concurrent writers that invalidated the
/// caller's read-decide-append snapshot.
///
/// See `SPEC_FULL.md` §4.8 for the full truth table; in short:
/// - With neither field set, the append always passes.
/// - `fail_if_events_match` alone fails the append if any matching event
///   exists at all.
/// - `after_sequence_position` alone fails the append if the ledger has
///   advanced since the caller's snapshot.
/// - Both together fail the append only if a matching event exists *after*
///   the baseline position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendCondition {
    pub fail_if_events_match: Option<Query>,
    pub after_sequence_position: Option<u64>,
}

impl AppendCondition {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn fail_if_events_match(query: Query) -> Self {
        Self {
            fail_if_events_match: Some(query),
            after_sequence_position: None,
        }
    }

    pub fn after_sequence_position(position: u64) -> Self {
        Self {
            fail_if_events_match: None,
            after_sequence_position: Some(position),
        }
    }

    pub fn with_after_sequence_position(mut self, position: u64) -> Self {
        self.after_sequence_position = Some(position);
        self
    }

    /// A condition is a no-op when it carries no baseline and no query, or a
    /// query that itself matches nothing (an empty `Query` is "match all",
    /// which is meaningful here, so only `None` counts as "no query").
    pub fn is_unconditional(&self) -> bool {
        self.fail_if_events_match.is_none() && self.after_sequence_position.is_none()
    }
}
