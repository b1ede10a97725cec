//! Identifiers and index ranges.
//!
//! Event indexes are dense, strictly increasing integers assigned by the
//! remote log per scope. Gaps only appear where events have expired
//! server-side.

use serde::{Deserialize, Serialize};

/// Identifies one conversation (direct chat, group, or channel).
pub type ChatId = u128;

/// Stable identifier of a user.
pub type UserId = u64;

/// Client-assigned identifier of an outbound message.
pub type MessageId = u128;

/// Position of an event within a scope's log.
pub type EventIndex = u64;

/// Position of a message within a scope's log (messages are a subset of
/// events, with their own dense numbering).
pub type MessageIndex = u64;

/// Milliseconds since the Unix epoch, as reported by the remote log.
pub type TimestampMillis = u64;

/// Cache partition key: a conversation plus an optional thread root.
///
/// Thread events live in their own index space, so a thread is a distinct
/// scope from its parent chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChatScope {
    /// The conversation this scope belongs to.
    pub chat_id: ChatId,
    /// Root message index when addressing a thread, `None` for the main log.
    pub thread_root: Option<MessageIndex>,
}

impl ChatScope {
    /// Scope for a conversation's main event log.
    pub fn chat(chat_id: ChatId) -> Self {
        Self { chat_id, thread_root: None }
    }

    /// Scope for a thread rooted at the given message index.
    pub fn thread(chat_id: ChatId, root: MessageIndex) -> Self {
        Self { chat_id, thread_root: Some(root) }
    }
}

/// Inclusive `[start, end]` bound on event indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRange {
    /// Lowest index in the range.
    pub start: EventIndex,
    /// Highest index in the range.
    pub end: EventIndex,
}

impl IndexRange {
    /// Creates a range, normalizing a reversed pair.
    pub fn new(a: EventIndex, b: EventIndex) -> Self {
        if a <= b { Self { start: a, end: b } } else { Self { start: b, end: a } }
    }

    /// Whether `index` falls within the range.
    pub fn contains(&self, index: EventIndex) -> bool {
        (self.start..=self.end).contains(&index)
    }

    /// Number of indexes covered.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Inclusive ranges are never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Clamps `index` into the range.
    pub fn clamp(&self, index: EventIndex) -> EventIndex {
        index.clamp(self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_normalizes_reversed_bounds() {
        let range = IndexRange::new(9, 3);
        assert_eq!(range, IndexRange { start: 3, end: 9 });
        assert_eq!(range.len(), 7);
    }

    #[test]
    fn range_contains_is_inclusive() {
        let range = IndexRange::new(2, 5);
        assert!(range.contains(2));
        assert!(range.contains(5));
        assert!(!range.contains(1));
        assert!(!range.contains(6));
    }

    #[test]
    fn thread_scope_is_distinct_from_chat_scope() {
        let chat = ChatScope::chat(7);
        let thread = ChatScope::thread(7, 42);
        assert_ne!(chat, thread);
    }
}
