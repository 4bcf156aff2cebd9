//! Deterministic test doubles for the session manager.
//!
//! The session components are written against the `Transport` and
//! `RoomLookup` seams, so tests need no sockets: [`MemoryBroker`] is an
//! in-process broker with scripted connect outcomes and a sent-message
//! log, and [`StaticRoomLookup`] is a scripted room directory. Combined
//! with tokio's paused clock they make every timing-sensitive scenario
//! (shared handshakes, history deadlines) reproducible.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod broker;
mod lookup;

pub use broker::{MemoryBroker, SentMessage};
pub use lookup::StaticRoomLookup;
