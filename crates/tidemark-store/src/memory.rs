//! In-memory reference implementation of [`CacheStore`].

use std::{
    collections::BTreeMap,
    sync::Arc,
};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tidemark_core::{
    ChatDetails, ChatId, ChatScope, EventIndex, EventRecord, EventsPage, IndexRange, MessageId,
    MessageIndex,
};
use tokio::sync::RwLock;

use crate::store::{CacheStore, FailedSendRecord, StoreError};

/// Deterministic in-memory cache store.
///
/// Values are held as CBOR blobs keyed by scope and index, so the store
/// behaves like the opaque key-addressed engine it stands in for. Cloning is
/// cheap; clones share the same underlying maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    scopes: BTreeMap<ChatScope, ScopeCache>,
    details: BTreeMap<ChatId, Vec<u8>>,
    failed_sends: BTreeMap<(ChatScope, MessageId), Vec<u8>>,
}

#[derive(Debug, Default)]
struct ScopeCache {
    events: BTreeMap<EventIndex, Vec<u8>>,
    message_to_event: BTreeMap<MessageIndex, EventIndex>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events cached for a scope. Test and diagnostics helper.
    pub async fn event_count(&self, scope: &ChatScope) -> usize {
        let inner = self.inner.read().await;
        inner.scopes.get(scope).map_or(0, |cache| cache.events.len())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)
        .map_err(|e| StoreError::Backend(format!("encode failed: {e}")))?;
    Ok(bytes)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    ciborium::de::from_reader(bytes)
        .map_err(|e| StoreError::Corrupt { reason: format!("decode failed: {e}") })
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn events_in_range(
        &self,
        scope: &ChatScope,
        range: IndexRange,
    ) -> Result<Vec<EventRecord>, StoreError> {
        let inner = self.inner.read().await;
        let Some(cache) = inner.scopes.get(scope) else {
            return Ok(Vec::new());
        };
        cache.events.range(range.start..=range.end).map(|(_, bytes)| decode(bytes)).collect()
    }

    async fn events_by_index(
        &self,
        scope: &ChatScope,
        indexes: &[EventIndex],
    ) -> Result<Vec<EventRecord>, StoreError> {
        let inner = self.inner.read().await;
        let Some(cache) = inner.scopes.get(scope) else {
            return Ok(Vec::new());
        };
        let mut sorted: Vec<EventIndex> = indexes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        sorted
            .into_iter()
            .filter_map(|index| cache.events.get(&index))
            .map(|bytes| decode(bytes))
            .collect()
    }

    async fn events_for_messages(
        &self,
        scope: &ChatScope,
        message_indexes: &[MessageIndex],
    ) -> Result<Vec<EventRecord>, StoreError> {
        let inner = self.inner.read().await;
        let Some(cache) = inner.scopes.get(scope) else {
            return Ok(Vec::new());
        };
        let mut event_indexes: Vec<EventIndex> = message_indexes
            .iter()
            .filter_map(|m| cache.message_to_event.get(m).copied())
            .collect();
        event_indexes.sort_unstable();
        event_indexes.dedup();
        event_indexes
            .into_iter()
            .filter_map(|index| cache.events.get(&index))
            .map(|bytes| decode(bytes))
            .collect()
    }

    async fn event_index_for_message(
        &self,
        scope: &ChatScope,
        message_index: MessageIndex,
    ) -> Result<Option<EventIndex>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .scopes
            .get(scope)
            .and_then(|cache| cache.message_to_event.get(&message_index).copied()))
    }

    async fn is_scope_known(&self, scope: &ChatScope) -> Result<bool, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.scopes.contains_key(scope))
    }

    async fn merge_events(&self, scope: &ChatScope, page: &EventsPage) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let cache = inner.scopes.entry(*scope).or_default();
        for record in &page.events {
            cache.events.insert(record.index, encode(record)?);
            if let Some(message_index) = record.message_index() {
                cache.message_to_event.insert(message_index, record.index);
            }
        }
        Ok(())
    }

    async fn details(&self, chat_id: ChatId) -> Result<Option<ChatDetails>, StoreError> {
        let inner = self.inner.read().await;
        inner.details.get(&chat_id).map(|bytes| decode(bytes)).transpose()
    }

    async fn put_details(&self, details: &ChatDetails) -> Result<(), StoreError> {
        let bytes = encode(details)?;
        let mut inner = self.inner.write().await;
        inner.details.insert(details.chat_id, bytes);
        Ok(())
    }

    async fn record_failed_send(&self, record: &FailedSendRecord) -> Result<(), StoreError> {
        let bytes = encode(record)?;
        let mut inner = self.inner.write().await;
        inner.failed_sends.insert((record.scope, record.message_id), bytes);
        Ok(())
    }

    async fn remove_failed_send(
        &self,
        scope: &ChatScope,
        message_id: MessageId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.failed_sends.remove(&(*scope, message_id));
        Ok(())
    }

    async fn failed_sends(&self, scope: &ChatScope) -> Result<Vec<FailedSendRecord>, StoreError> {
        let inner = self.inner.read().await;
        inner
            .failed_sends
            .range((*scope, MessageId::MIN)..=(*scope, MessageId::MAX))
            .map(|(_, bytes)| decode(bytes))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tidemark_core::{EventPayload, Message};

    use super::*;

    fn message_record(index: EventIndex, message_index: MessageIndex) -> EventRecord {
        EventRecord {
            index,
            timestamp: 1_000 + index,
            payload: EventPayload::Message(Box::new(Message {
                message_id: u128::from(message_index),
                message_index,
                sender: 7,
                text: format!("message {message_index}"),
                replies_to: None,
                edited: false,
            })),
        }
    }

    fn page(records: Vec<EventRecord>) -> EventsPage {
        EventsPage::from_events(records)
    }

    #[tokio::test]
    async fn roundtrips_events_through_cbor() {
        let store = MemoryStore::new();
        let scope = ChatScope::chat(1);
        let records = vec![message_record(0, 0), message_record(1, 1)];
        store.merge_events(&scope, &page(records.clone())).await.unwrap();

        let loaded = store.events_in_range(&scope, IndexRange::new(0, 10)).await.unwrap();
        assert_eq!(loaded, records);
    }

    #[tokio::test]
    async fn merge_is_idempotent() {
        let store = MemoryStore::new();
        let scope = ChatScope::chat(1);
        let p = page(vec![message_record(0, 0), message_record(1, 1)]);
        store.merge_events(&scope, &p).await.unwrap();
        store.merge_events(&scope, &p).await.unwrap();

        assert_eq!(store.event_count(&scope).await, 2);
    }

    #[tokio::test]
    async fn resolves_message_indexes() {
        let store = MemoryStore::new();
        let scope = ChatScope::chat(1);
        store.merge_events(&scope, &page(vec![message_record(5, 2)])).await.unwrap();

        assert_eq!(store.event_index_for_message(&scope, 2).await.unwrap(), Some(5));
        assert_eq!(store.event_index_for_message(&scope, 3).await.unwrap(), None);

        let events = store.events_for_messages(&scope, &[2, 3]).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].index, 5);
    }

    #[tokio::test]
    async fn scopes_are_isolated() {
        let store = MemoryStore::new();
        let chat = ChatScope::chat(1);
        let thread = ChatScope::thread(1, 0);
        store.merge_events(&chat, &page(vec![message_record(0, 0)])).await.unwrap();

        assert!(store.is_scope_known(&chat).await.unwrap());
        assert!(!store.is_scope_known(&thread).await.unwrap());
        assert!(store.events_in_range(&thread, IndexRange::new(0, 10)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_send_records_roundtrip() {
        let store = MemoryStore::new();
        let scope = ChatScope::chat(1);
        let record = FailedSendRecord { scope, message_id: 42, event: message_record(0, 0) };

        store.record_failed_send(&record).await.unwrap();
        assert_eq!(store.failed_sends(&scope).await.unwrap(), vec![record.clone()]);

        store.remove_failed_send(&scope, 42).await.unwrap();
        assert!(store.failed_sends(&scope).await.unwrap().is_empty());
    }
}
