//! Room names, subscription keys, and broker destination naming.
//!
//! All destination strings are derived here from typed values. Call sites
//! never concatenate topic names by hand, which keeps the channel-naming
//! policy in one place: chat flows over a per-room topic, history replies
//! over a per-user topic.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::participant::UserId;

/// Outbound destination for chat messages.
///
/// A single fixed command channel; the broker routes to the right room
/// using the room context attached to the payload.
pub const CHAT_SEND_DESTINATION: &str = "/app/chat";

/// Broker-assigned name of a two-participant conversation.
///
/// Resolved once per participant pair via the room lookup and treated as
/// stable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomName(String);

impl RoomName {
    /// Create a room name from its raw value.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Raw room name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a subscription listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    /// Live chat messages for a conversation.
    Chat,
    /// History replies for a single user.
    History,
}

/// Identity of one logical subscription.
///
/// At most one live broker subscription exists per key; repeated setup
/// calls (UI re-renders) reuse the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    /// Participant on whose behalf the subscription was opened.
    pub local: UserId,
    /// The other participant of the conversation.
    pub remote: UserId,
    /// Channel family the subscription listens on.
    pub kind: TopicKind,
}

impl SubscriptionKey {
    /// Key for the live chat topic of a conversation.
    #[must_use]
    pub const fn chat(local: UserId, remote: UserId) -> Self {
        Self { local, remote, kind: TopicKind::Chat }
    }

    /// Key for a user's history reply topic.
    #[must_use]
    pub const fn history(user: UserId) -> Self {
        Self { local: user, remote: user, kind: TopicKind::History }
    }
}

/// Inbound topic carrying live chat messages for a room.
#[must_use]
pub fn chat_topic(room: &RoomName) -> String {
    format!("/topic/chat/{room}")
}

/// Outbound command destination requesting a user's chat history.
#[must_use]
pub fn history_request_destination(user: UserId) -> String {
    format!("/app/chat/history/{user}")
}

/// Inbound per-user topic carrying history replies.
#[must_use]
pub fn history_topic(user: UserId) -> String {
    format!("/user/{user}/topic/chat/history")
}
