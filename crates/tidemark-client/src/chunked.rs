//! Recovery from oversized remote responses.
//!
//! When the remote service rejects a page as too large, the drivers here
//! re-issue the fetch as a sequence of smaller calls and stitch the chunks
//! into one logical page with the same shape a single large fetch would have
//! produced: no reordering, no duplicate indexes, expiry hints concatenated.
//!
//! A non-size error from any chunk propagates immediately and the partial
//! accumulation is discarded: a silently truncated page must never be
//! returned (or cached) as if it were complete.

use std::future::Future;

use tidemark_core::{EventIndex, EventsPage, IndexRange, MessageIndex};

use crate::transport::FetchError;

/// Each size rejection divides the chunk size by this factor, to a floor of
/// one event per call.
const CHUNK_REDUCTION_FACTOR: usize = 2;

/// Fetches `range` in bounded chunks, walking from `start_index` in the
/// requested direction.
///
/// `fetch(start, max_events)` must retrieve events from `start` in the same
/// direction. Chunking starts at half of `max_events` and halves again on
/// every further size rejection; a rejection at chunk size one propagates.
/// Terminates when the range bound is covered or a chunk comes back empty
/// (end of history).
pub async fn chunked_events<F, Fut>(
    fetch: F,
    range: IndexRange,
    start_index: EventIndex,
    ascending: bool,
    max_events: usize,
) -> Result<EventsPage, FetchError>
where
    F: Fn(EventIndex, usize) -> Fut,
    Fut: Future<Output = Result<EventsPage, FetchError>>,
{
    let mut chunk_size = (max_events / CHUNK_REDUCTION_FACTOR).max(1);
    let mut combined = EventsPage::default();
    let mut next = Some(range.clamp(start_index));

    while let Some(start) = next {
        match fetch(start, chunk_size).await {
            Ok(chunk) => {
                if chunk.is_empty() {
                    // End of history on this side.
                    break;
                }
                let covered_before = covered_edge(&combined, ascending);
                combined = EventsPage::merge(combined, chunk);
                let covered_after = covered_edge(&combined, ascending);
                if covered_after == covered_before {
                    // The remote is not advancing coverage; stop rather than
                    // refetch the same events forever.
                    break;
                }
                next = advance(&combined, range, ascending);
            }
            Err(err) if err.is_too_large() && chunk_size > 1 => {
                chunk_size = (chunk_size / CHUNK_REDUCTION_FACTOR).max(1);
            }
            Err(err) => return Err(err),
        }
    }

    Ok(combined)
}

/// Fetches a window around `midpoint` in bounded chunks.
///
/// The window fetch is shrunk until the side containing the midpoint fits,
/// then coverage is extended in both directions with [`chunked_events`]
/// until `range` is satisfied or history runs out on that side.
pub async fn chunked_events_window<FW, FutW, FR, FutR>(
    fetch_window: FW,
    fetch_range: FR,
    range: IndexRange,
    midpoint: MessageIndex,
    max_events: usize,
) -> Result<EventsPage, FetchError>
where
    FW: Fn(MessageIndex, usize) -> FutW,
    FutW: Future<Output = Result<EventsPage, FetchError>>,
    FR: Fn(EventIndex, bool, usize) -> FutR,
    FutR: Future<Output = Result<EventsPage, FetchError>>,
{
    let mut chunk_size = (max_events / CHUNK_REDUCTION_FACTOR).max(1);
    let seed = loop {
        match fetch_window(midpoint, chunk_size).await {
            Ok(page) => break page,
            Err(err) if err.is_too_large() && chunk_size > 1 => {
                chunk_size = (chunk_size / CHUNK_REDUCTION_FACTOR).max(1);
            }
            Err(err) => return Err(err),
        }
    };
    if seed.is_empty() {
        return Ok(seed);
    }

    // The inner drivers halve once before their first call; undo that so
    // extension fetches start at the chunk size the window already proved.
    let extend_budget = (chunk_size * CHUNK_REDUCTION_FACTOR).min(max_events.max(1));

    let mut combined = seed;
    if let Some(hi) = combined.max_covered_index().filter(|&hi| hi < range.end) {
        let upper = chunked_events(
            |start, size| fetch_range(start, true, size),
            range,
            hi + 1,
            true,
            extend_budget,
        )
        .await?;
        combined = EventsPage::merge(combined, upper);
    }
    if let Some(lo) = combined.min_covered_index().filter(|&lo| lo > range.start) {
        let lower = chunked_events(
            |start, size| fetch_range(start, false, size),
            range,
            lo - 1,
            false,
            extend_budget,
        )
        .await?;
        combined = EventsPage::merge(combined, lower);
    }

    Ok(combined)
}

fn covered_edge(page: &EventsPage, ascending: bool) -> Option<EventIndex> {
    if ascending { page.max_covered_index() } else { page.min_covered_index() }
}

fn advance(combined: &EventsPage, range: IndexRange, ascending: bool) -> Option<EventIndex> {
    if ascending {
        match combined.max_covered_index() {
            Some(hi) if hi < range.end => Some(hi + 1),
            _ => None,
        }
    } else {
        match combined.min_covered_index() {
            Some(lo) if lo > range.start => Some(lo - 1),
            _ => None,
        }
    }
}
