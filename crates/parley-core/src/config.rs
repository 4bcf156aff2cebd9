//! Session configuration and credentials.

use std::{fmt, time::Duration};

/// How long a history fetch waits for a reply before resolving empty.
pub const DEFAULT_HISTORY_TIMEOUT: Duration = Duration::from_secs(20);

/// Configuration for one chat session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket endpoint of the broker.
    pub websocket_url: String,
    /// Base URL of the HTTP API used for room lookups.
    pub api_base_url: String,
    /// Deadline for history fetches.
    pub history_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            websocket_url: "ws://localhost:8060/websocket".to_string(),
            api_base_url: "http://localhost:8060".to_string(),
            history_timeout: DEFAULT_HISTORY_TIMEOUT,
        }
    }
}

/// Opaque bearer token identifying the session owner.
///
/// Supplied once at session construction and attached to both the
/// transport connect headers and room-lookup requests. A new credential
/// requires a new session; there is no hot-swap.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Header name the credential is sent under.
    pub const HEADER: &'static str = "X-Authorization";

    /// Wrap a raw bearer token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Header value carrying the token.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// The connect headers for an authenticated transport handshake.
    #[must_use]
    pub fn connect_headers(&self) -> Vec<(String, String)> {
        vec![(Self::HEADER.to_string(), self.bearer())]
    }
}

// Tokens must never appear in logs or error output.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(..)")
    }
}
