//! Core data model for the Tidemark cache synchronization engine.
//!
//! Conversation history is an append-only log of indexed events, partitioned
//! per [`ChatScope`]. This crate defines the types that flow between the
//! local cache store, the remote transport, and the reconciliation client:
//!
//! - [`EventRecord`] / [`EventPayload`]: one ordered entry in a chat's log
//! - [`EventsPage`]: an ordered slice of the log plus expiry hints
//! - [`ChatDetails`] / [`ChatDetailsUpdates`]: versioned aggregate chat state
//!   refreshed via a "updates since" delta protocol
//!
//! All merge logic here is pure: no I/O, no clocks. Both merges are
//! idempotent and never move a version/timestamp backward, which is what
//! allows concurrent reconciliation requests for the same scope to write back
//! independently without coordination.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod details;
mod event;
mod ids;
mod page;

pub use details::{
    ChatDetails, ChatDetailsResponse, ChatDetailsUpdates, ChatRole, DetailsUpdatesResponse, Member,
    VersionedRules,
};
pub use event::{
    ChatCreated, EventPayload, EventRecord, MembersAdded, MembersRemoved, Message, MessagePinned,
    MessageUnpinned, NameChanged, RoleChanged, RulesChanged,
};
pub use ids::{
    ChatId, ChatScope, EventIndex, IndexRange, MessageId, MessageIndex, TimestampMillis, UserId,
};
