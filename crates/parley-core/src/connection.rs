//! Connection lifecycle state.

/// State of the single underlying broker connection.
///
/// Exactly one session owns this state; it is the source of truth for
/// "is the transport usable". Transitions happen synchronously with
/// connect/disconnect settlement:
///
/// ```text
/// ┌──────────────┐  connect   ┌────────────┐  handshake ok   ┌───────────┐
/// │ Disconnected │───────────>│ Connecting │────────────────>│ Connected │
/// └──────────────┘            └────────────┘                 └───────────┘
///        ^                          │ handshake error              │
///        │                          ↓                              │
///        │       connect      ┌────────┐                           │
///        └────────────────────│ Failed │       disconnect          │
///          (retry allowed)    └────────┘<──────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection; none being attempted.
    #[default]
    Disconnected,
    /// A handshake is in flight; all callers share its outcome.
    Connecting,
    /// The transport is usable.
    Connected,
    /// The last handshake failed. A later connect may retry.
    Failed,
}

impl ConnectionState {
    /// Whether the transport is currently usable.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connected_is_usable() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(!ConnectionState::Failed.is_connected());
    }
}
