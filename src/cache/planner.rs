//! Invalidation plan generation.
//!
//! Merges a batch of cache events into one set of tags to drop.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use super::events::CacheEvent;
use super::tags::{Tag, TagMode};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
    pub invalidate_tags: BTreeSet<Tag>,
    /// A flush supersedes every tag in the batch.
    pub flush: bool,
    pub event_count: usize,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InvalidationPlan {{ events: {}, tags: {}, flush: {} }}",
            self.event_count,
            self.invalidate_tags.len(),
            self.flush
        )
    }
}

impl InvalidationPlan {
    /// Deduplicates by event id and unions the tags of the remaining events.
    pub fn from_events(events: Vec<CacheEvent>, mode: TagMode) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();

        for event in events.into_iter().filter(|event| seen_ids.insert(event.id)) {
            plan.event_count += 1;
            if event.kind.is_flush() {
                plan.flush = true;
            } else {
                plan.invalidate_tags.extend(event.kind.tags_for(mode));
            }
        }

        if plan.flush {
            plan.invalidate_tags.clear();
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        !self.flush && self.invalidate_tags.is_empty()
    }
}
