//! Event records and payload variants.
//!
//! Events are immutable once created: edits, deletions, and reactions all
//! produce new event entries rather than mutating history in place. The
//! cache therefore stores records as read-only snapshots keyed by index.

use serde::{Deserialize, Serialize};

use crate::ids::{EventIndex, MessageId, MessageIndex, TimestampMillis, UserId};

/// One ordered entry in a conversation's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position of this event within its scope.
    pub index: EventIndex,
    /// Server-assigned creation time.
    pub timestamp: TimestampMillis,
    /// What happened.
    pub payload: EventPayload,
}

impl EventRecord {
    /// Whether this record carries a message payload.
    ///
    /// Messages are counted separately from other events because their
    /// payloads dominate response size.
    pub fn is_message(&self) -> bool {
        matches!(self.payload, EventPayload::Message(_))
    }

    /// The message index, for message events.
    pub fn message_index(&self) -> Option<MessageIndex> {
        match &self.payload {
            EventPayload::Message(message) => Some(message.message_index),
            _ => None,
        }
    }
}

/// Payload variants of a chat event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    /// A user message.
    Message(Box<Message>),
    /// The conversation was created.
    ChatCreated(ChatCreated),
    /// Users were added to the conversation.
    MembersAdded(MembersAdded),
    /// Users were removed from the conversation.
    MembersRemoved(MembersRemoved),
    /// A member's role changed.
    RoleChanged(RoleChanged),
    /// The conversation was renamed.
    NameChanged(NameChanged),
    /// The conversation rules changed.
    RulesChanged(RulesChanged),
    /// A message was pinned.
    MessagePinned(MessagePinned),
    /// A message was unpinned.
    MessageUnpinned(MessageUnpinned),
}

/// A user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Client-assigned id, stable across send retries.
    pub message_id: MessageId,
    /// Position within the scope's message numbering.
    pub message_index: MessageIndex,
    /// Author.
    pub sender: UserId,
    /// Message body.
    pub text: String,
    /// Event index of the message this one replies to, if any.
    pub replies_to: Option<EventIndex>,
    /// Whether the message has been edited since creation.
    pub edited: bool,
}

/// The conversation was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCreated {
    /// Conversation name at creation.
    pub name: String,
    /// Creator.
    pub created_by: UserId,
}

/// Users were added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembersAdded {
    /// The users that joined.
    pub user_ids: Vec<UserId>,
    /// Who added them.
    pub added_by: UserId,
}

/// Users were removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembersRemoved {
    /// The users that were removed.
    pub user_ids: Vec<UserId>,
    /// Who removed them.
    pub removed_by: UserId,
}

/// A member's role changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChanged {
    /// The affected users.
    pub user_ids: Vec<UserId>,
    /// Who changed the role.
    pub changed_by: UserId,
}

/// The conversation was renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameChanged {
    /// The new name.
    pub new_name: String,
    /// Who renamed it.
    pub changed_by: UserId,
}

/// The conversation rules changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesChanged {
    /// Whether rules are now enabled.
    pub enabled: bool,
    /// Who changed them.
    pub changed_by: UserId,
}

/// A message was pinned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePinned {
    /// The pinned message.
    pub message_index: MessageIndex,
    /// Who pinned it.
    pub pinned_by: UserId,
}

/// A message was unpinned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageUnpinned {
    /// The unpinned message.
    pub message_index: MessageIndex,
    /// Who unpinned it.
    pub unpinned_by: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_record(index: EventIndex, message_index: MessageIndex) -> EventRecord {
        EventRecord {
            index,
            timestamp: 1_000,
            payload: EventPayload::Message(Box::new(Message {
                message_id: 1,
                message_index,
                sender: 7,
                text: "hi".to_string(),
                replies_to: None,
                edited: false,
            })),
        }
    }

    #[test]
    fn message_records_expose_message_index() {
        let record = message_record(10, 4);
        assert!(record.is_message());
        assert_eq!(record.message_index(), Some(4));
    }

    #[test]
    fn non_message_records_have_no_message_index() {
        let record = EventRecord {
            index: 0,
            timestamp: 0,
            payload: EventPayload::ChatCreated(ChatCreated {
                name: "general".to_string(),
                created_by: 1,
            }),
        };
        assert!(!record.is_message());
        assert_eq!(record.message_index(), None);
    }
}
