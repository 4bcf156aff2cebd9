//! Client-side session manager for a pub/sub chat broker.
//!
//! Mediates between UI consumers and the broker over one persistent,
//! authenticated connection:
//!
//! - [`ConnectionSession`]: connect-once-with-sharing lifecycle of the
//!   single transport connection
//! - [`SubscriptionRegistry`]: deduplicated topic subscriptions
//! - [`RoomResolver`]: memoized room-name resolution per participant pair
//! - [`HistoryRequestBridge`]: one-shot request/response emulation for
//!   history fetches over the pub/sub substrate
//! - [`ChatSession`]: the facade UI collaborators consume
//!
//! All components are written against the [`Transport`] and [`RoomLookup`]
//! seams; nothing here performs I/O directly.
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`stomp::StompTransport`]: STOMP 1.2 over WebSocket
//! - [`http::HttpRoomLookup`]: authenticated room lookup over HTTP

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod error;
mod history;
mod resolver;
mod session;
mod subscriptions;
mod transport;

#[cfg(feature = "transport")]
pub mod http;
#[cfg(feature = "transport")]
pub mod stomp;

pub use client::ChatSession;
pub use error::ClientError;
pub use history::HistoryRequestBridge;
pub use parley_core::{
    ChatMessage, ConnectionState, Credential, RoomName, SessionConfig, SubscriptionKey, UserId,
};
pub use resolver::{RoomLookup, RoomResolver};
pub use session::ConnectionSession;
pub use subscriptions::SubscriptionRegistry;
pub use transport::{MessageHandler, SubscriptionHandle, Transport, TransportError};
