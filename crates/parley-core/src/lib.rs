//! Core data model for the Parley chat session manager.
//!
//! Everything here is plain data: participant identities, normalized
//! participant pairs, room names, subscription keys, broker destination
//! naming, message types, connection state, and session configuration.
//! No I/O lives in this crate; the session manager in `parley-client`
//! consumes these types.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod connection;
mod message;
mod participant;
mod topic;

pub use config::{Credential, DEFAULT_HISTORY_TIMEOUT, SessionConfig};
pub use connection::ConnectionState;
pub use message::{AddressedMessage, ChatMessage};
pub use participant::{ParticipantPair, UserId};
pub use topic::{
    CHAT_SEND_DESTINATION, RoomName, SubscriptionKey, TopicKind, chat_topic,
    history_request_destination, history_topic,
};
