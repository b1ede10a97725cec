//! Cache reconciliation client for Tidemark.
//!
//! [`ChatSyncClient`] is the per-request orchestrator: it consults the local
//! [`tidemark_store::CacheStore`] for whatever part of a request is already
//! known, fetches only the missing indexes through an injected
//! [`EventsTransport`], merges the two halves, and writes the result back to
//! the cache as a detached best-effort task.
//!
//! Request lifecycle: cache lookup → complete hit / partial miss / total
//! miss → fetch (with chunked subdivision when the remote rejects a page as
//! too large) → merge and cache → return. Oversized responses are the only
//! failure this layer recovers from; every other remote error propagates
//! unchanged, and no local cache failure ever fails a request.
//!
//! # Components
//!
//! - [`ChatSyncClient`]: request-kind dispatch and caching side effects
//! - [`EventsTransport`]: the remote event-retrieval capability
//! - [`chunked_events`] / [`chunked_events_window`]: oversized-response
//!   recovery
//! - [`SyncConfig`]: page-size and miss-threshold policy

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod chunked;
mod client;
mod transport;

pub use chunked::{chunked_events, chunked_events_window};
pub use client::{
    ChatSyncClient, DEFAULT_MAX_EVENTS, DEFAULT_MAX_MESSAGES, DEFAULT_MAX_MISSING, SyncConfig,
};
pub use transport::{EventsTransport, FetchError, SendAck};
