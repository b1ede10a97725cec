//! Shared fixtures: an in-memory remote log standing in for the real
//! transport, with scripted failures and a call journal for assertions.

#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use tidemark_client::{EventsTransport, FetchError, SendAck};
use tidemark_core::{
    ChatDetails, ChatId, ChatScope, DetailsUpdatesResponse, EventIndex, EventPayload, EventRecord,
    EventsPage, Member, Message, MessageIndex, TimestampMillis, VersionedRules,
};

/// One observed transport invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Range { start: EventIndex, max_events: usize },
    Window { midpoint: MessageIndex, max_events: usize },
    ByIndex(Vec<EventIndex>),
    Messages(Vec<MessageIndex>),
    DetailsInitial,
    DetailsUpdates(TimestampMillis),
    Send(u128),
}

/// Scripted remote log.
pub struct FakeTransport {
    log: BTreeMap<EventIndex, EventRecord>,
    /// Requests asking for more than this many events are rejected as too
    /// large.
    pub reject_over: Option<usize>,
    /// Hard error injected into range/window fetches.
    pub fail_fetch: Mutex<Option<FetchError>>,
    pub fail_send: Mutex<bool>,
    pub details_initial: Mutex<Option<Result<ChatDetails, FetchError>>>,
    pub details_updates: Mutex<Option<Result<DetailsUpdatesResponse, FetchError>>>,
    pub calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    /// A remote log holding message events at indexes `0..count`, with
    /// message index equal to event index.
    pub fn with_messages(count: u64) -> Self {
        Self {
            log: (0..count).map(|i| (i, message_record(i))).collect(),
            reject_over: None,
            fail_fetch: Mutex::new(None),
            fail_send: Mutex::new(false),
            details_initial: Mutex::new(None),
            details_updates: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    pub fn range_call_count(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Range { .. })).count()
    }

    pub fn by_index_call_count(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::ByIndex(_))).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(call);
    }

    fn check_size(&self, max_events: usize) -> Result<(), FetchError> {
        match self.reject_over {
            Some(limit) if max_events > limit => Err(FetchError::ResponseTooLarge),
            _ => Ok(()),
        }
    }

    fn check_fail(&self) -> Result<(), FetchError> {
        match &*self.fail_fetch.lock().unwrap_or_else(std::sync::PoisonError::into_inner) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn page(&self, events: Vec<EventRecord>) -> EventsPage {
        let mut page = EventsPage::from_events(events);
        page.latest_event_index = self.log.keys().next_back().copied();
        page
    }
}

#[async_trait]
impl EventsTransport for FakeTransport {
    async fn events_in_range(
        &self,
        _scope: &ChatScope,
        start_index: EventIndex,
        ascending: bool,
        _max_messages: usize,
        max_events: usize,
        _latest_known_update: Option<TimestampMillis>,
    ) -> Result<EventsPage, FetchError> {
        self.record(Call::Range { start: start_index, max_events });
        self.check_fail()?;
        self.check_size(max_events)?;

        let events: Vec<EventRecord> = if ascending {
            self.log.range(start_index..).take(max_events).map(|(_, e)| e.clone()).collect()
        } else {
            self.log.range(..=start_index).rev().take(max_events).map(|(_, e)| e.clone()).collect()
        };
        Ok(self.page(events))
    }

    async fn events_window(
        &self,
        _scope: &ChatScope,
        midpoint: MessageIndex,
        _max_messages: usize,
        max_events: usize,
        _latest_known_update: Option<TimestampMillis>,
    ) -> Result<EventsPage, FetchError> {
        self.record(Call::Window { midpoint, max_events });
        self.check_fail()?;
        self.check_size(max_events)?;

        // Message index equals event index in this log.
        let mut indexes = vec![midpoint];
        let mut above = midpoint + 1;
        let mut below = midpoint.checked_sub(1);
        while indexes.len() < max_events {
            let before = indexes.len();
            if self.log.contains_key(&above) {
                indexes.push(above);
                above += 1;
            }
            let takeable_below =
                below.filter(|b| self.log.contains_key(b) && indexes.len() < max_events);
            if let Some(b) = takeable_below {
                indexes.push(b);
                below = b.checked_sub(1);
            }
            if indexes.len() == before {
                break;
            }
        }

        let events: Vec<EventRecord> =
            indexes.iter().filter_map(|i| self.log.get(i).cloned()).collect();
        Ok(self.page(events))
    }

    async fn events_by_index(
        &self,
        _scope: &ChatScope,
        indexes: &[EventIndex],
        _latest_known_update: Option<TimestampMillis>,
    ) -> Result<EventsPage, FetchError> {
        self.record(Call::ByIndex(indexes.to_vec()));
        let events: Vec<EventRecord> =
            indexes.iter().filter_map(|i| self.log.get(i).cloned()).collect();
        Ok(self.page(events))
    }

    async fn messages_by_index(
        &self,
        _scope: &ChatScope,
        message_indexes: &[MessageIndex],
        _latest_known_update: Option<TimestampMillis>,
    ) -> Result<EventsPage, FetchError> {
        self.record(Call::Messages(message_indexes.to_vec()));
        let events: Vec<EventRecord> = message_indexes
            .iter()
            .filter_map(|i| self.log.get(i).cloned())
            .filter(|e| e.is_message())
            .collect();
        Ok(self.page(events))
    }

    async fn details_initial(&self, _chat_id: ChatId) -> Result<ChatDetails, FetchError> {
        self.record(Call::DetailsInitial);
        self.details_initial
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| Err(FetchError::Transport("no scripted details".to_string())))
    }

    async fn details_updates(
        &self,
        _chat_id: ChatId,
        updates_since: TimestampMillis,
    ) -> Result<DetailsUpdatesResponse, FetchError> {
        self.record(Call::DetailsUpdates(updates_since));
        self.details_updates
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .unwrap_or(Ok(DetailsUpdatesResponse::Failure))
        // Failure is the unscripted default: callers that never configure a
        // delta exercise the stale-snapshot path.
    }

    async fn send_message(
        &self,
        _scope: &ChatScope,
        message: &Message,
    ) -> Result<SendAck, FetchError> {
        self.record(Call::Send(message.message_id));
        if *self.fail_send.lock().unwrap_or_else(std::sync::PoisonError::into_inner) {
            return Err(FetchError::Transport("send rejected".to_string()));
        }
        let next = self.log.keys().next_back().map_or(0, |i| i + 1);
        Ok(SendAck { event_index: next, message_index: next, timestamp: 2_000 + next })
    }
}

/// A message event whose message index equals its event index.
pub fn message_record(index: EventIndex) -> EventRecord {
    EventRecord {
        index,
        timestamp: 1_000 + index,
        payload: EventPayload::Message(Box::new(Message {
            message_id: u128::from(index),
            message_index: index,
            sender: 7,
            text: format!("message {index}"),
            replies_to: None,
            edited: false,
        })),
    }
}

/// An outbound message not yet acknowledged by the remote log.
pub fn draft_message(message_id: u128) -> Message {
    Message {
        message_id,
        message_index: 0,
        sender: 7,
        text: "draft".to_string(),
        replies_to: None,
        edited: false,
    }
}

/// A details snapshot at the given timestamp.
pub fn details_snapshot(chat_id: ChatId, timestamp: TimestampMillis) -> ChatDetails {
    ChatDetails {
        chat_id,
        timestamp,
        latest_event_index: 50,
        members: vec![Member { user_id: 1, role: tidemark_core::ChatRole::Owner }],
        blocked_users: std::collections::BTreeSet::new(),
        invited_users: std::collections::BTreeSet::new(),
        pinned_messages: std::collections::BTreeSet::new(),
        rules: VersionedRules { text: "be kind".to_string(), version: 1, enabled: true },
    }
}

/// Polls `probe` until it reports true or a short deadline passes. Used to
/// observe detached cache write-backs.
pub async fn wait_until<F, Fut>(probe: F) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if probe().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    false
}
