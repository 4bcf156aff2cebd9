//! STOMP 1.2 frame codec.
//!
//! Text frames of the shape `COMMAND\nheader:value\n...\n\nbody\0`, as
//! carried one-per-message over a WebSocket. Only the commands the chat
//! session actually exchanges are implemented, not the whole protocol.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod frame;

pub use frame::{Command, Frame, ProtocolError};
