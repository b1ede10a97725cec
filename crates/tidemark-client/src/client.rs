//! The reconciliation orchestrator.

use std::sync::Arc;

use tidemark_core::{
    ChatDetails, ChatDetailsResponse, ChatId, ChatScope, DetailsUpdatesResponse, EventIndex,
    EventPayload, EventRecord, EventsPage, IndexRange, Message, MessageIndex, TimestampMillis,
};
use tidemark_store::{
    CacheStore, FailedSendRecord,
    miss::{self, CachedEvents, CachedMessages},
};

use crate::{
    chunked::{chunked_events, chunked_events_window},
    transport::{EventsTransport, FetchError, SendAck},
};

/// Default cap on events per remote page.
pub const DEFAULT_MAX_EVENTS: usize = 500;

/// Default cap on messages per remote page. Messages are a subset of events
/// with much heavier payloads, so they carry their own cap.
pub const DEFAULT_MAX_MESSAGES: usize = 50;

/// Default missing-index count at which a request stops enumerating point
/// lookups and refetches the whole range instead.
pub const DEFAULT_MAX_MISSING: usize = 30;

/// Page-size and miss-threshold policy for a [`ChatSyncClient`].
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Cap on events per remote page.
    pub max_events: usize,
    /// Cap on messages per remote page.
    pub max_messages: usize,
    /// Missing-index count at which a partial hit degrades to a total miss.
    pub max_missing: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_events: DEFAULT_MAX_EVENTS,
            max_messages: DEFAULT_MAX_MESSAGES,
            max_missing: DEFAULT_MAX_MISSING,
        }
    }
}

/// Reconciles event requests against the local cache and the remote log.
///
/// Both collaborators are injected: the cache store so tests can run against
/// a deterministic in-memory fake, the transport because the wire protocol
/// is not this layer's business. Requests for different scopes may run
/// concurrently; requests for the same scope are not serialized. Duplicate
/// fetches converge at write-back because the store merge is idempotent.
pub struct ChatSyncClient<S, T> {
    store: Arc<S>,
    transport: Arc<T>,
    config: SyncConfig,
}

impl<S, T> ChatSyncClient<S, T>
where
    S: CacheStore,
    T: EventsTransport,
{
    /// Creates a client with the default policy.
    pub fn new(store: Arc<S>, transport: Arc<T>) -> Self {
        Self::with_config(store, transport, SyncConfig::default())
    }

    /// Creates a client with an explicit policy.
    pub fn with_config(store: Arc<S>, transport: Arc<T>, config: SyncConfig) -> Self {
        Self { store, transport, config }
    }

    /// The active policy.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Events within `range`, walking from `start_index` in the requested
    /// direction.
    ///
    /// Serves from cache when possible, fetches exactly the missing indexes
    /// when the gap is small, and refetches the whole range when the cache
    /// cannot usefully contribute.
    pub async fn events(
        &self,
        scope: &ChatScope,
        range: IndexRange,
        start_index: EventIndex,
        ascending: bool,
        latest_known_update: Option<TimestampMillis>,
    ) -> Result<EventsPage, FetchError> {
        let cached = match miss::cached_events_in_range(
            self.store.as_ref(),
            scope,
            range,
            start_index,
            ascending,
            self.config.max_events,
        )
        .await
        {
            Ok(cached) => cached,
            Err(err) => {
                tracing::warn!(error = %err, "cache read failed; treating request as a total miss");
                return self
                    .range_from_remote(scope, range, start_index, ascending, latest_known_update)
                    .await;
            }
        };

        if cached.missing.len() >= self.config.max_missing {
            tracing::debug!(
                missing = cached.missing.len(),
                "cache gap too large; refetching the whole range"
            );
            return self
                .range_from_remote(scope, range, start_index, ascending, latest_known_update)
                .await;
        }

        self.resolve_missing(scope, cached, latest_known_update).await
    }

    /// Events at exactly the given indexes.
    pub async fn events_by_index(
        &self,
        scope: &ChatScope,
        indexes: &[EventIndex],
        latest_known_update: Option<TimestampMillis>,
    ) -> Result<EventsPage, FetchError> {
        let cached = match miss::cached_events_by_index(self.store.as_ref(), scope, indexes).await {
            Ok(cached) => cached,
            Err(err) => {
                tracing::warn!(error = %err, "cache read failed; treating request as a total miss");
                CachedEvents {
                    page: EventsPage::default(),
                    missing: indexes.iter().copied().collect(),
                }
            }
        };

        if cached.missing.len() >= self.config.max_missing {
            let page = self.transport.events_by_index(scope, indexes, latest_known_update).await?;
            self.write_back(scope, page.clone());
            return Ok(page);
        }

        self.resolve_missing(scope, cached, latest_known_update).await
    }

    /// Events surrounding the message at `midpoint`, bounded by `range`.
    ///
    /// Unlike plain range requests, a window is a total miss whenever the
    /// store has never seen the scope or cannot resolve the midpoint
    /// locally, regardless of how small the missing count might have been:
    /// locating a midpoint requires a contiguous known chain.
    pub async fn events_window(
        &self,
        scope: &ChatScope,
        range: IndexRange,
        midpoint: MessageIndex,
        latest_known_update: Option<TimestampMillis>,
    ) -> Result<EventsPage, FetchError> {
        let (cached, total_miss) = match miss::cached_events_window(
            self.store.as_ref(),
            scope,
            range,
            midpoint,
            self.config.max_events,
        )
        .await
        {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(error = %err, "cache read failed; treating window as a total miss");
                (CachedEvents::default(), true)
            }
        };

        if total_miss || cached.missing.len() >= self.config.max_missing {
            tracing::debug!(
                total_miss,
                missing = cached.missing.len(),
                "window not resolvable from cache; fetching from the remote log"
            );
            return self.window_from_remote(scope, range, midpoint, latest_known_update).await;
        }

        self.resolve_missing(scope, cached, latest_known_update).await
    }

    /// Message events at exactly the given message indexes.
    pub async fn messages_by_index(
        &self,
        scope: &ChatScope,
        message_indexes: &[MessageIndex],
        latest_known_update: Option<TimestampMillis>,
    ) -> Result<EventsPage, FetchError> {
        let cached =
            match miss::cached_messages_by_index(self.store.as_ref(), scope, message_indexes).await
            {
                Ok(cached) => cached,
                Err(err) => {
                    tracing::warn!(error = %err, "cache read failed; fetching all requested messages");
                    CachedMessages {
                        page: EventsPage::default(),
                        missing: message_indexes.iter().copied().collect(),
                    }
                }
            };

        if cached.missing.is_empty() {
            return Ok(cached.page);
        }

        let missing: Vec<MessageIndex> = cached.missing.iter().copied().collect();
        let fresh = self.transport.messages_by_index(scope, &missing, latest_known_update).await?;
        let merged = EventsPage::merge(cached.page, fresh);
        self.write_back(scope, merged.clone());
        Ok(merged)
    }

    /// Aggregate details for a conversation, reconciled against
    /// `chat_last_updated` (the freshest timestamp the caller has observed).
    ///
    /// A cached snapshot at least as fresh as `chat_last_updated` is served
    /// as-is. A stale snapshot is refreshed with an "updates since" delta; a
    /// delta failure serves the stale snapshot with no freshness guarantee.
    pub async fn chat_details(
        &self,
        chat_id: ChatId,
        chat_last_updated: TimestampMillis,
    ) -> Result<ChatDetailsResponse, FetchError> {
        let cached = match self.store.details(chat_id).await {
            Ok(cached) => cached,
            Err(err) => {
                tracing::warn!(error = %err, "cached details unreadable; fetching from the remote log");
                None
            }
        };

        match cached {
            Some(previous) if previous.timestamp >= chat_last_updated => {
                Ok(ChatDetailsResponse::Success(previous))
            }
            Some(previous) => {
                let previous_timestamp = previous.timestamp;
                let response =
                    match self.transport.details_updates(chat_id, previous_timestamp).await {
                        Ok(response) => response,
                        Err(FetchError::NotFound) => return Ok(ChatDetailsResponse::NotFound),
                        Err(err) => return Err(err),
                    };
                let refreshed = match response {
                    DetailsUpdatesResponse::Failure => {
                        tracing::warn!("details delta query failed; serving the previous snapshot");
                        previous
                    }
                    DetailsUpdatesResponse::SuccessNoUpdates { timestamp } => {
                        previous.confirmed_at(timestamp)
                    }
                    DetailsUpdatesResponse::Success(updates) => previous.merge_updates(&updates),
                };
                if refreshed.timestamp > previous_timestamp {
                    self.cache_details(&refreshed).await;
                }
                Ok(ChatDetailsResponse::Success(refreshed))
            }
            None => match self.transport.details_initial(chat_id).await {
                Ok(details) => {
                    self.cache_details(&details).await;
                    Ok(ChatDetailsResponse::Success(details))
                }
                Err(FetchError::NotFound) => Ok(ChatDetailsResponse::NotFound),
                Err(err) => Err(err),
            },
        }
    }

    /// Sends a message, maintaining the failed-send record around the
    /// attempt.
    ///
    /// The record is removed pessimistically before the attempt and
    /// re-created on failure; the send error itself is always re-raised.
    pub async fn send_message(
        &self,
        scope: &ChatScope,
        message: Message,
    ) -> Result<SendAck, FetchError> {
        if let Err(err) = self.store.remove_failed_send(scope, message.message_id).await {
            tracing::warn!(error = %err, "failed to clear failed-send record before sending");
        }

        match self.transport.send_message(scope, &message).await {
            Ok(ack) => {
                if let Err(err) = self.store.remove_failed_send(scope, message.message_id).await {
                    tracing::warn!(error = %err, "failed to clear stale failed-send record");
                }
                let mut sent = message;
                sent.message_index = ack.message_index;
                let record = EventRecord {
                    index: ack.event_index,
                    timestamp: ack.timestamp,
                    payload: EventPayload::Message(Box::new(sent)),
                };
                let mut page = EventsPage::from_events(vec![record]);
                page.latest_event_index = Some(ack.event_index);
                self.write_back(scope, page);
                Ok(ack)
            }
            Err(err) => {
                let record = FailedSendRecord {
                    scope: *scope,
                    message_id: message.message_id,
                    event: EventRecord {
                        index: 0,
                        timestamp: 0,
                        payload: EventPayload::Message(Box::new(message)),
                    },
                };
                if let Err(store_err) = self.store.record_failed_send(&record).await {
                    tracing::error!(error = %store_err, "failed to record failed send");
                }
                Err(err)
            }
        }
    }

    /// Failed-send records for a scope, for retry UI.
    pub async fn failed_sends(&self, scope: &ChatScope) -> Vec<FailedSendRecord> {
        match self.store.failed_sends(scope).await {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read failed-send records");
                Vec::new()
            }
        }
    }

    async fn cache_details(&self, details: &ChatDetails) {
        if let Err(err) = self.store.put_details(details).await {
            tracing::warn!(error = %err, "failed to cache chat details");
        }
    }

    /// Fetches the missing indexes of a partial hit and merges them with the
    /// cached page.
    async fn resolve_missing(
        &self,
        scope: &ChatScope,
        cached: CachedEvents,
        latest_known_update: Option<TimestampMillis>,
    ) -> Result<EventsPage, FetchError> {
        if cached.missing.is_empty() {
            return Ok(cached.page);
        }

        let indexes: Vec<EventIndex> = cached.missing.iter().copied().collect();
        let fresh = self.transport.events_by_index(scope, &indexes, latest_known_update).await?;
        let merged = EventsPage::merge(cached.page, fresh);
        self.write_back(scope, merged.clone());
        Ok(merged)
    }

    /// Full-range remote fetch with chunked fallback on size rejection.
    async fn range_from_remote(
        &self,
        scope: &ChatScope,
        range: IndexRange,
        start_index: EventIndex,
        ascending: bool,
        latest_known_update: Option<TimestampMillis>,
    ) -> Result<EventsPage, FetchError> {
        let direct = self
            .transport
            .events_in_range(
                scope,
                start_index,
                ascending,
                self.config.max_messages,
                self.config.max_events,
                latest_known_update,
            )
            .await;

        let page = match direct {
            Ok(page) => page,
            Err(err) if err.is_too_large() => {
                tracing::debug!("range response too large; refetching in chunks");
                chunked_events(
                    |start, size| {
                        self.transport.events_in_range(
                            scope,
                            start,
                            ascending,
                            self.config.max_messages,
                            size,
                            latest_known_update,
                        )
                    },
                    range,
                    start_index,
                    ascending,
                    self.config.max_events,
                )
                .await?
            }
            Err(err) => return Err(err),
        };

        self.write_back(scope, page.clone());
        Ok(page)
    }

    /// Full-window remote fetch with chunked fallback on size rejection.
    async fn window_from_remote(
        &self,
        scope: &ChatScope,
        range: IndexRange,
        midpoint: MessageIndex,
        latest_known_update: Option<TimestampMillis>,
    ) -> Result<EventsPage, FetchError> {
        let direct = self
            .transport
            .events_window(
                scope,
                midpoint,
                self.config.max_messages,
                self.config.max_events,
                latest_known_update,
            )
            .await;

        let page = match direct {
            Ok(page) => page,
            Err(err) if err.is_too_large() => {
                tracing::debug!("window response too large; refetching in chunks");
                chunked_events_window(
                    |mid, size| {
                        self.transport.events_window(
                            scope,
                            mid,
                            self.config.max_messages,
                            size,
                            latest_known_update,
                        )
                    },
                    |start, ascending, size| {
                        self.transport.events_in_range(
                            scope,
                            start,
                            ascending,
                            self.config.max_messages,
                            size,
                            latest_known_update,
                        )
                    },
                    range,
                    midpoint,
                    self.config.max_events,
                )
                .await?
            }
            Err(err) => return Err(err),
        };

        self.write_back(scope, page.clone());
        Ok(page)
    }

    /// Persists a page to the cache as a detached best-effort task.
    ///
    /// Caching is a performance optimization: a persistence failure is
    /// logged and never surfaced to the request that produced the page.
    fn write_back(&self, scope: &ChatScope, page: EventsPage) {
        let store = Arc::clone(&self.store);
        let scope = *scope;
        tokio::spawn(async move {
            if let Err(err) = store.merge_events(&scope, &page).await {
                tracing::warn!(error = %err, "failed to write events back to the cache");
            }
        });
    }
}
