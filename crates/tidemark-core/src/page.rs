//! Ordered slices of a conversation's event log.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    event::EventRecord,
    ids::{EventIndex, IndexRange},
};

/// A successfully retrieved slice of a scope's event log.
///
/// Invariant: `events` is sorted strictly ascending by index with no
/// duplicates. Fetch direction only determines which indexes are requested;
/// pages always carry the canonical ascending form.
///
/// `expired_event_ranges` and `expired_message_ranges` are hints about
/// server-side pruned spans. They may overlap across merged pages; consumers
/// treat them as hints, not ground truth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsPage {
    /// The retrieved events, ascending by index.
    pub events: Vec<EventRecord>,
    /// Index spans pruned from the remote log.
    pub expired_event_ranges: Vec<IndexRange>,
    /// Message-index spans pruned from the remote log.
    pub expired_message_ranges: Vec<IndexRange>,
    /// Highest event index the remote log had seen when this page was
    /// produced, if known.
    pub latest_event_index: Option<EventIndex>,
}

impl EventsPage {
    /// A page holding the given events, normalized to ascending order.
    pub fn from_events(events: Vec<EventRecord>) -> Self {
        let mut page = Self { events, ..Self::default() };
        page.normalize();
        page
    }

    /// Whether the page carries no events and no expiry hints.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
            && self.expired_event_ranges.is_empty()
            && self.expired_message_ranges.is_empty()
    }

    /// Lowest event index covered by this page, counting expiry hints.
    pub fn min_covered_index(&self) -> Option<EventIndex> {
        let events_min = self.events.first().map(|e| e.index);
        let expired_min = self.expired_event_ranges.iter().map(|r| r.start).min();
        match (events_min, expired_min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Highest event index covered by this page, counting expiry hints.
    pub fn max_covered_index(&self) -> Option<EventIndex> {
        let events_max = self.events.last().map(|e| e.index);
        let expired_max = self.expired_event_ranges.iter().map(|r| r.end).max();
        match (events_max, expired_max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// Merges a cached page with a freshly fetched one.
    ///
    /// Events are deduplicated by index with `fresh` winning, and re-sorted
    /// ascending. Expired-range lists are concatenated. The latest event
    /// index is the maximum of the two; an absent value never overrides a
    /// present one. Merging the same page twice yields the same result.
    pub fn merge(cached: Self, fresh: Self) -> Self {
        let mut by_index: BTreeMap<EventIndex, EventRecord> = BTreeMap::new();
        for record in cached.events {
            by_index.insert(record.index, record);
        }
        for record in fresh.events {
            by_index.insert(record.index, record);
        }

        let mut expired_event_ranges = cached.expired_event_ranges;
        expired_event_ranges.extend(fresh.expired_event_ranges);
        let mut expired_message_ranges = cached.expired_message_ranges;
        expired_message_ranges.extend(fresh.expired_message_ranges);

        let latest_event_index = match (cached.latest_event_index, fresh.latest_event_index) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        Self {
            events: by_index.into_values().collect(),
            expired_event_ranges,
            expired_message_ranges,
            latest_event_index,
        }
    }

    fn normalize(&mut self) {
        self.events.sort_by_key(|e| e.index);
        self.events.dedup_by_key(|e| e.index);
    }
}
