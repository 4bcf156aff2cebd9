//! Error types for the session manager.
//!
//! Foreign failures (transport, HTTP) are carried as string reasons so
//! every variant stays `Clone` — in-flight outcomes are shared between
//! concurrent callers, and each waiter receives the same error value.
//!
//! A history timeout is deliberately NOT an error: it settles the fetch
//! with an empty history (see [`crate::HistoryRequestBridge`]).

use thiserror::Error;

/// Errors surfaced at the session-manager boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// Transport handshake failed. The session moves to `Failed`; a later
    /// connect may retry. Never retried automatically.
    #[error("connection failed: {reason}")]
    Connection {
        /// Underlying transport failure.
        reason: String,
    },

    /// Room lookup failed. Nothing is cached; a later resolve retries.
    #[error("room lookup failed: {reason}")]
    Lookup {
        /// HTTP or decode failure.
        reason: String,
    },

    /// The transport rejected an outbound publish.
    #[error("send failed: {reason}")]
    Send {
        /// Underlying transport failure.
        reason: String,
    },

    /// The transport rejected a subscription request.
    #[error("subscribe failed: {reason}")]
    Subscribe {
        /// Underlying transport failure.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_their_reason() {
        let err = ClientError::Connection { reason: "refused".to_string() };
        assert_eq!(err.to_string(), "connection failed: refused");

        let err = ClientError::Lookup { reason: "status 404".to_string() };
        assert_eq!(err.to_string(), "room lookup failed: status 404");
    }
}
