//! Types for the `add_tags` maintenance operation (spec §4.9). The operation
//! itself is implemented by the storage backend; this crate only defines its
//! contract boundary.

use serde::{Deserialize, Serialize};

use crate::event::Tag;

/// Proposes zero or more tags to attach to an already-committed event.
///
/// Implementors receive the event's current type, position and existing tags
/// and return the tags they'd like present. Keys already on the event are
/// discarded by the engine (first-wins, consistent with append); only
/// genuinely new keys are added.
pub trait TagFactory<P>: Send + Sync {
    fn propose_tags(&self, position: u64, event_type: &str, payload: &P, existing: &[Tag]) -> Vec<Tag>;
}

impl<P, F> TagFactory<P> for F
where
    F: Fn(u64, &str, &P, &[Tag]) -> Vec<Tag> + Send + Sync,
{
    fn propose_tags(&self, position: u64, event_type: &str, payload: &P, existing: &[Tag]) -> Vec<Tag> {
        (self)(position, event_type, payload, existing)
    }
}

/// Summary of an `add_tags` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMigrationResult {
    /// Number of committed events of the target type that were examined.
    pub events_scanned: u64,
    /// Number of those events that received at least one new tag.
    pub events_modified: u64,
    /// Total number of new tag entries written across all modified events.
    pub tags_added: u64,
}

impl TagMigrationResult {
    pub fn record(&mut self, new_tag_count: usize) {
        self.events_scanned += 1;
        if new_tag_count > 0 {
            self.events_modified += 1;
            self.tags_added += new_tag_count as u64;
        }
    }
}
