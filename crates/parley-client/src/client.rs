//! The session facade consumed by UI collaborators.

use std::sync::Arc;

use chrono::Utc;
use parley_core::{
    AddressedMessage, CHAT_SEND_DESTINATION, ChatMessage, ConnectionState, Credential,
    ParticipantPair, SessionConfig, SubscriptionKey, UserId, chat_topic,
};
use tokio::sync::watch;

use crate::{
    ClientError, ConnectionSession, HistoryRequestBridge, MessageHandler, RoomLookup,
    RoomResolver, SubscriptionRegistry, Transport,
};

/// One chat session over one authenticated connection.
///
/// Explicitly constructed and passed by reference to every consumer — no
/// process-wide singleton. The session owns the shared connection, the
/// subscription registry, the room-name cache, and all pending history
/// requests; consumers mutate that state only through these methods.
///
/// Dropping the session does not close the transport; call
/// [`disconnect`](Self::disconnect) when the owning scope unmounts.
pub struct ChatSession<T, L> {
    transport: Arc<T>,
    session: ConnectionSession<T>,
    registry: Arc<SubscriptionRegistry<T>>,
    resolver: RoomResolver<L>,
    history: HistoryRequestBridge<T>,
}

#[cfg(feature = "transport")]
impl ChatSession<crate::stomp::StompTransport, crate::http::HttpRoomLookup> {
    /// Create a session over the production STOMP transport and HTTP room
    /// lookup, both targeting the endpoints in `config`.
    #[must_use]
    pub fn with_stomp_transport(credential: Credential, config: &SessionConfig) -> Self {
        let transport = crate::stomp::StompTransport::new(config.websocket_url.clone());
        let lookup =
            crate::http::HttpRoomLookup::new(config.api_base_url.clone(), credential.clone());
        Self::new(transport, lookup, credential, config)
    }
}

impl<T: Transport, L: RoomLookup> ChatSession<T, L> {
    /// Create a session. The credential is fixed for the session's
    /// lifetime; a new credential requires a new session.
    pub fn new(transport: T, lookup: L, credential: Credential, config: &SessionConfig) -> Self {
        let transport = Arc::new(transport);
        let registry = Arc::new(SubscriptionRegistry::new(Arc::clone(&transport)));
        let session = ConnectionSession::new(Arc::clone(&transport), credential);
        let resolver = RoomResolver::new(Arc::new(lookup));
        let history = HistoryRequestBridge::new(
            Arc::clone(&transport),
            Arc::clone(&registry),
            config.history_timeout,
        );

        Self { transport, session, registry, resolver, history }
    }

    /// Establish the connection, sharing any in-flight attempt.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.session.connect().await
    }

    /// Tear the session down: every subscription is closed, every pending
    /// history fetch settles with an empty history, then the transport is
    /// closed. Safe to call when already disconnected.
    pub async fn disconnect(&self) {
        self.registry.clear_all().await;
        self.history.settle_all_empty();
        self.session.disconnect().await;
    }

    /// Whether the transport is currently usable.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Observe connection-state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.session.watch()
    }

    /// Send a chat message from `sender` to `receiver`.
    ///
    /// Ensures the connection, resolves the room for the pair, stamps the
    /// message, and hands it to the transport's chat channel with the room
    /// context attached. Messages reach the transport in the order this
    /// method is invoked; broker acknowledgment is not awaited.
    pub async fn send_message(
        &self,
        sender: UserId,
        receiver: UserId,
        content: &str,
    ) -> Result<(), ClientError> {
        self.session.connect().await?;
        let room = self.resolver.resolve(ParticipantPair::new(sender, receiver)).await?;

        let payload = AddressedMessage {
            room_name: room,
            message: ChatMessage {
                sender_id: sender,
                receiver_id: receiver,
                message: content.to_string(),
                timestamp: Some(Utc::now()),
            },
        };
        let body =
            serde_json::to_vec(&payload).map_err(|e| ClientError::Send { reason: e.to_string() })?;

        self.transport
            .send(CHAT_SEND_DESTINATION, &body)
            .await
            .map_err(|e| ClientError::Send { reason: e.to_string() })?;
        tracing::debug!(%sender, %receiver, "chat message handed to transport");

        Ok(())
    }

    /// Subscribe `on_message` to the conversation between `local` and
    /// `remote`.
    ///
    /// Ensures the connection, resolves the room, and registers the
    /// handler on the room's chat topic. Repeated calls for the same
    /// `(local, remote)` pair reuse the first subscription; the new
    /// handler is discarded. Payloads that fail to decode are dropped
    /// with a warning.
    pub async fn subscribe_to_chat_topic<F>(
        &self,
        local: UserId,
        remote: UserId,
        on_message: F,
    ) -> Result<(), ClientError>
    where
        F: Fn(ChatMessage) + Send + Sync + 'static,
    {
        self.session.connect().await?;
        let room = self.resolver.resolve(ParticipantPair::new(local, remote)).await?;

        let handler: MessageHandler = Arc::new(move |payload: &[u8]| {
            match serde_json::from_slice::<ChatMessage>(payload) {
                Ok(message) => on_message(message),
                Err(e) => tracing::warn!(error = %e, "malformed chat payload, dropping"),
            }
        });

        self.registry
            .ensure_subscribed(SubscriptionKey::chat(local, remote), &chat_topic(&room), handler)
            .await
    }

    /// Fetch the chat history for `user`.
    ///
    /// Ensures the connection, then delegates to the history bridge:
    /// resolves with the reply payload, or with an empty history at the
    /// deadline. A fetch issued while one is pending for the same user
    /// joins the in-flight cycle.
    pub async fn chat_history(&self, user: UserId) -> Result<Vec<ChatMessage>, ClientError> {
        self.session.connect().await?;
        self.history.fetch(user).await
    }
}
