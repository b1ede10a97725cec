//! Aggregate chat state and its delta protocol.
//!
//! A [`ChatDetails`] snapshot holds the member list, moderation state, and
//! rules for one conversation, stamped with the server's logical timestamp.
//! Rather than refetching the whole snapshot on every view, the client asks
//! the remote service for "updates since T" and folds the resulting
//! [`ChatDetailsUpdates`] delta into the previous snapshot.
//!
//! Merge rules: list-valued fields are additive/subtractive via explicit
//! add/remove sub-lists, scalar fields are replaced wholesale when present in
//! the delta, and the timestamp only ever advances. Applying the same delta
//! twice leaves the snapshot unchanged.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::{ChatId, EventIndex, MessageIndex, TimestampMillis, UserId};

/// Versioned aggregate state of one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatDetails {
    /// The conversation this snapshot describes.
    pub chat_id: ChatId,
    /// Logical clock of the snapshot; monotonically non-decreasing.
    pub timestamp: TimestampMillis,
    /// Highest event index the server had seen at `timestamp`.
    pub latest_event_index: EventIndex,
    /// Current members with their roles.
    pub members: Vec<Member>,
    /// Users blocked from the conversation.
    pub blocked_users: BTreeSet<UserId>,
    /// Users invited but not yet joined.
    pub invited_users: BTreeSet<UserId>,
    /// Pinned message indexes.
    pub pinned_messages: BTreeSet<MessageIndex>,
    /// Conversation rules.
    pub rules: VersionedRules,
}

/// One member of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The user.
    pub user_id: UserId,
    /// Their role.
    pub role: ChatRole,
}

/// Role of a member within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    /// Full control, including deletion.
    Owner,
    /// Administrative permissions.
    Admin,
    /// Moderation permissions.
    Moderator,
    /// Ordinary member.
    Member,
}

/// Conversation rules with an acceptance version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedRules {
    /// Rules text.
    pub text: String,
    /// Bumped whenever the text changes; members re-accept on change.
    pub version: u32,
    /// Whether members must accept the rules before posting.
    pub enabled: bool,
}

/// Changes to a [`ChatDetails`] snapshot since a given timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatDetailsUpdates {
    /// Logical clock of the delta.
    pub timestamp: TimestampMillis,
    /// New latest event index, when it advanced.
    pub latest_event_index: Option<EventIndex>,
    /// Members that joined or whose role changed; upserted by user id.
    pub members_added_or_updated: Vec<Member>,
    /// Members that left or were removed.
    pub members_removed: Vec<UserId>,
    /// Users newly blocked.
    pub blocked_users_added: Vec<UserId>,
    /// Users unblocked.
    pub blocked_users_removed: Vec<UserId>,
    /// Full replacement of the invited-user set, when it changed.
    pub invited_users: Option<BTreeSet<UserId>>,
    /// Messages newly pinned.
    pub pinned_messages_added: Vec<MessageIndex>,
    /// Messages unpinned.
    pub pinned_messages_removed: Vec<MessageIndex>,
    /// New rules, when they changed.
    pub rules: Option<VersionedRules>,
}

/// Outcome of an "updates since" query against the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetailsUpdatesResponse {
    /// The service could not produce a delta; the previous snapshot remains
    /// valid but carries no freshness guarantee.
    Failure,
    /// Nothing changed since the requested timestamp.
    SuccessNoUpdates {
        /// The timestamp the "no changes" claim is valid up to.
        timestamp: TimestampMillis,
    },
    /// Changes since the requested timestamp.
    Success(Box<ChatDetailsUpdates>),
}

/// Result of a details lookup exposed to callers.
///
/// A deleted or inaccessible conversation is a terminal outcome the UI must
/// render, not an error to propagate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatDetailsResponse {
    /// The conversation's current details.
    Success(ChatDetails),
    /// The conversation does not exist or is no longer accessible.
    NotFound,
}

impl ChatDetails {
    /// Returns a copy with the timestamp advanced to `timestamp`.
    ///
    /// Used for "no updates since" confirmations. The timestamp never moves
    /// backward.
    pub fn confirmed_at(&self, timestamp: TimestampMillis) -> Self {
        let mut confirmed = self.clone();
        confirmed.timestamp = confirmed.timestamp.max(timestamp);
        confirmed
    }

    /// Folds a delta into this snapshot, returning the updated snapshot.
    pub fn merge_updates(&self, updates: &ChatDetailsUpdates) -> Self {
        let mut merged = self.clone();

        merged.members.retain(|m| !updates.members_removed.contains(&m.user_id));
        for incoming in &updates.members_added_or_updated {
            match merged.members.iter_mut().find(|m| m.user_id == incoming.user_id) {
                Some(existing) => *existing = *incoming,
                None => merged.members.push(*incoming),
            }
        }

        for user_id in &updates.blocked_users_added {
            merged.blocked_users.insert(*user_id);
        }
        for user_id in &updates.blocked_users_removed {
            merged.blocked_users.remove(user_id);
        }

        if let Some(invited) = &updates.invited_users {
            merged.invited_users = invited.clone();
        }

        for index in &updates.pinned_messages_added {
            merged.pinned_messages.insert(*index);
        }
        for index in &updates.pinned_messages_removed {
            merged.pinned_messages.remove(index);
        }

        if let Some(rules) = &updates.rules {
            merged.rules = rules.clone();
        }

        if let Some(latest) = updates.latest_event_index {
            merged.latest_event_index = merged.latest_event_index.max(latest);
        }
        merged.timestamp = merged.timestamp.max(updates.timestamp);

        merged
    }
}
