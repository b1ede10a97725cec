//! The cache store trait and its error type.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tidemark_core::{
    ChatDetails, ChatId, ChatScope, EventIndex, EventRecord, EventsPage, IndexRange, MessageId,
    MessageIndex,
};

/// Errors reported by a cache store.
///
/// Store errors never fail a reconciliation request: readers degrade to a
/// cache miss and writers log and drop. The variants exist so those fallback
/// paths can say what went wrong.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A stored value could not be decoded.
    #[error("corrupt cache entry: {reason}")]
    Corrupt {
        /// What failed to decode.
        reason: String,
    },

    /// The underlying storage engine failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A provisional record of a message whose send attempt failed.
///
/// Created pessimistically before each send and removed on acknowledgment;
/// its presence after a failure is what lets the UI offer a retry. Not a
/// durability guarantee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedSendRecord {
    /// Scope the message was sent to.
    pub scope: ChatScope,
    /// Client-assigned id of the message.
    pub message_id: MessageId,
    /// The event as it would have appeared, for rendering the retry UI.
    pub event: EventRecord,
}

/// Key-addressed persistent cache of conversation events and aggregate state.
///
/// Implementations own the persisted data exclusively; callers hold only
/// transient request-scoped views. All writes are additive and idempotent:
/// content per event index is immutable, so duplicate concurrent writes of
/// the same index converge.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Cached events within `range`, ascending by index. Absent indexes are
    /// simply not returned.
    async fn events_in_range(
        &self,
        scope: &ChatScope,
        range: IndexRange,
    ) -> Result<Vec<EventRecord>, StoreError>;

    /// Cached events for exactly the given indexes, ascending.
    async fn events_by_index(
        &self,
        scope: &ChatScope,
        indexes: &[EventIndex],
    ) -> Result<Vec<EventRecord>, StoreError>;

    /// Cached message events for the given message indexes, ascending by
    /// event index.
    async fn events_for_messages(
        &self,
        scope: &ChatScope,
        message_indexes: &[MessageIndex],
    ) -> Result<Vec<EventRecord>, StoreError>;

    /// Resolves a message index to its event index, if the message is cached.
    async fn event_index_for_message(
        &self,
        scope: &ChatScope,
        message_index: MessageIndex,
    ) -> Result<Option<EventIndex>, StoreError>;

    /// Whether the store has ever cached anything for this scope.
    async fn is_scope_known(&self, scope: &ChatScope) -> Result<bool, StoreError>;

    /// Merges a page of events into the cache.
    async fn merge_events(&self, scope: &ChatScope, page: &EventsPage) -> Result<(), StoreError>;

    /// The cached aggregate snapshot for a conversation, if any.
    async fn details(&self, chat_id: ChatId) -> Result<Option<ChatDetails>, StoreError>;

    /// Replaces the cached aggregate snapshot.
    async fn put_details(&self, details: &ChatDetails) -> Result<(), StoreError>;

    /// Records a failed send, replacing any previous record for the same
    /// message id.
    async fn record_failed_send(&self, record: &FailedSendRecord) -> Result<(), StoreError>;

    /// Removes the failed-send record for a message id, if present.
    async fn remove_failed_send(
        &self,
        scope: &ChatScope,
        message_id: MessageId,
    ) -> Result<(), StoreError>;

    /// All failed-send records for a scope.
    async fn failed_sends(&self, scope: &ChatScope) -> Result<Vec<FailedSendRecord>, StoreError>;
}
