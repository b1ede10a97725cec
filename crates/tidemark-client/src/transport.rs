//! Remote event-retrieval capability.
//!
//! This is a thin seam to the wire: request signing, serialization, and
//! transport-level retries all live behind it. The one piece of transport
//! classification this layer depends on is the distinction between
//! [`FetchError::ResponseTooLarge`] and everything else: "too large" is an
//! ordinary recoverable value consumed by the chunked retry driver, never an
//! exception.

use async_trait::async_trait;
use thiserror::Error;
use tidemark_core::{
    ChatDetails, ChatId, ChatScope, DetailsUpdatesResponse, EventIndex, EventsPage, Message,
    MessageIndex, TimestampMillis,
};

/// Errors reported by the remote service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The server cannot produce the requested page in one response. The
    /// caller should subdivide the request; this is not a terminal failure.
    #[error("response too large for the requested page")]
    ResponseTooLarge,

    /// The destination conversation does not exist or is inaccessible.
    #[error("destination not found")]
    NotFound,

    /// The serving replica cannot answer right now.
    #[error("replica unavailable")]
    ReplicaUnavailable,

    /// Any other transport failure (network, timeout, protocol).
    #[error("transport failure: {0}")]
    Transport(String),
}

impl FetchError {
    /// Whether this error signals an oversized response, recoverable by
    /// subdividing the request.
    pub fn is_too_large(&self) -> bool {
        matches!(self, Self::ResponseTooLarge)
    }
}

/// Acknowledgment of a successfully sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendAck {
    /// Index assigned to the new event.
    pub event_index: EventIndex,
    /// Index assigned to the new message.
    pub message_index: MessageIndex,
    /// Server-assigned creation time.
    pub timestamp: TimestampMillis,
}

/// The remote event log, consumed as an opaque query/update capability.
///
/// All retrieval methods bound the requested volume with `max_events` and,
/// independently, `max_messages`; message payloads are heavier than other
/// events, so they carry their own cap.
#[async_trait]
pub trait EventsTransport: Send + Sync + 'static {
    /// Events from `start_index` walking in the requested direction.
    async fn events_in_range(
        &self,
        scope: &ChatScope,
        start_index: EventIndex,
        ascending: bool,
        max_messages: usize,
        max_events: usize,
        latest_known_update: Option<TimestampMillis>,
    ) -> Result<EventsPage, FetchError>;

    /// Events surrounding the message at `midpoint`, expanding outward to
    /// fill the page.
    async fn events_window(
        &self,
        scope: &ChatScope,
        midpoint: MessageIndex,
        max_messages: usize,
        max_events: usize,
        latest_known_update: Option<TimestampMillis>,
    ) -> Result<EventsPage, FetchError>;

    /// Exactly the events at the given indexes.
    async fn events_by_index(
        &self,
        scope: &ChatScope,
        indexes: &[EventIndex],
        latest_known_update: Option<TimestampMillis>,
    ) -> Result<EventsPage, FetchError>;

    /// Exactly the message events at the given message indexes.
    async fn messages_by_index(
        &self,
        scope: &ChatScope,
        message_indexes: &[MessageIndex],
        latest_known_update: Option<TimestampMillis>,
    ) -> Result<EventsPage, FetchError>;

    /// Full aggregate details for a conversation.
    async fn details_initial(&self, chat_id: ChatId) -> Result<ChatDetails, FetchError>;

    /// Changes to the aggregate details since `updates_since`.
    async fn details_updates(
        &self,
        chat_id: ChatId,
        updates_since: TimestampMillis,
    ) -> Result<DetailsUpdatesResponse, FetchError>;

    /// Sends a message into the scope.
    async fn send_message(
        &self,
        scope: &ChatScope,
        message: &Message,
    ) -> Result<SendAck, FetchError>;
}
