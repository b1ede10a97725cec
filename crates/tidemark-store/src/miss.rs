//! Splits requested event slices into cache hits and missing indexes.
//!
//! Every reconciliation request starts here: the detector enumerates the
//! indexes the request would touch (bounded by the caller's page size),
//! reads what the store already holds, and reports the rest as missing.
//! Policy decisions (treating a large missing set as a total miss, choosing
//! fetch strategies) belong to the caller, not this module.

use std::collections::BTreeSet;

use tidemark_core::{ChatScope, EventIndex, EventRecord, EventsPage, IndexRange, MessageIndex};

use crate::store::{CacheStore, StoreError};

/// Locally available events plus the indexes that were requested but absent.
#[derive(Debug, Clone, Default)]
pub struct CachedEvents {
    /// The cache hits, as a canonical ascending page.
    pub page: EventsPage,
    /// Requested indexes the store does not hold.
    pub missing: BTreeSet<EventIndex>,
}

/// Locally available message events plus the missing message indexes.
#[derive(Debug, Clone, Default)]
pub struct CachedMessages {
    /// The cache hits, as a canonical ascending page.
    pub page: EventsPage,
    /// Requested message indexes the store does not hold.
    pub missing: BTreeSet<MessageIndex>,
}

/// Hits and misses for a directional range request.
///
/// At most `max_events` candidate indexes are considered, walking from
/// `start_index` toward the range bound in the requested direction.
pub async fn cached_events_in_range<S>(
    store: &S,
    scope: &ChatScope,
    range: IndexRange,
    start_index: EventIndex,
    ascending: bool,
    max_events: usize,
) -> Result<CachedEvents, StoreError>
where
    S: CacheStore + ?Sized,
{
    let start = range.clamp(start_index);
    let budget = max_events.max(1) as u64;
    let span = if ascending {
        IndexRange::new(start, range.end.min(start.saturating_add(budget - 1)))
    } else {
        IndexRange::new(range.start.max(start.saturating_sub(budget - 1)), start)
    };

    let hits = store.events_in_range(scope, span).await?;
    Ok(split_span(span, hits))
}

/// Hits and misses for an explicit index-set request.
pub async fn cached_events_by_index<S>(
    store: &S,
    scope: &ChatScope,
    indexes: &[EventIndex],
) -> Result<CachedEvents, StoreError>
where
    S: CacheStore + ?Sized,
{
    let hits = store.events_by_index(scope, indexes).await?;
    let found: BTreeSet<EventIndex> = hits.iter().map(|e| e.index).collect();
    let missing = indexes.iter().copied().filter(|i| !found.contains(i)).collect();
    Ok(CachedEvents { page: EventsPage::from_events(hits), missing })
}

/// Hits and misses for a message-index lookup.
pub async fn cached_messages_by_index<S>(
    store: &S,
    scope: &ChatScope,
    message_indexes: &[MessageIndex],
) -> Result<CachedMessages, StoreError>
where
    S: CacheStore + ?Sized,
{
    let hits = store.events_for_messages(scope, message_indexes).await?;
    let found: BTreeSet<MessageIndex> = hits.iter().filter_map(EventRecord::message_index).collect();
    let missing = message_indexes.iter().copied().filter(|i| !found.contains(i)).collect();
    Ok(CachedMessages { page: EventsPage::from_events(hits), missing })
}

/// Hits and misses for a window request centered on a message.
///
/// Returns `total_miss = true` when the store knows nothing about the scope
/// at all, or when the midpoint message cannot be resolved locally. Locating
/// a midpoint requires a contiguous known chain, so these cases skip
/// reconciliation entirely and the caller goes straight to the remote
/// service. This is deliberately stricter than the plain range path.
pub async fn cached_events_window<S>(
    store: &S,
    scope: &ChatScope,
    range: IndexRange,
    midpoint: MessageIndex,
    max_events: usize,
) -> Result<(CachedEvents, bool), StoreError>
where
    S: CacheStore + ?Sized,
{
    if !store.is_scope_known(scope).await? {
        return Ok((CachedEvents::default(), true));
    }
    let Some(mid_event) = store.event_index_for_message(scope, midpoint).await? else {
        return Ok((CachedEvents::default(), true));
    };

    let span = window_span(range, range.clamp(mid_event), max_events.max(1) as u64);
    let hits = store.events_in_range(scope, span).await?;
    Ok((split_span(span, hits), false))
}

/// A contiguous span of up to `budget` indexes centered on `mid`, shifted to
/// stay within `range`.
fn window_span(range: IndexRange, mid: EventIndex, budget: u64) -> IndexRange {
    let mut lo = mid;
    let mut hi = mid;
    let mut remaining = budget - 1;
    while remaining > 0 && (lo > range.start || hi < range.end) {
        if hi < range.end {
            hi += 1;
            remaining -= 1;
            if remaining == 0 {
                break;
            }
        }
        if lo > range.start {
            lo -= 1;
            remaining -= 1;
        }
    }
    IndexRange::new(lo, hi)
}

fn split_span(span: IndexRange, hits: Vec<EventRecord>) -> CachedEvents {
    let found: BTreeSet<EventIndex> = hits.iter().map(|e| e.index).collect();
    let missing =
        (span.start..=span.end).filter(|i| !found.contains(i)).collect();
    CachedEvents { page: EventsPage::from_events(hits), missing }
}
