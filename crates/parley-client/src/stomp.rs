//! STOMP 1.2 over WebSocket — thin client over `tokio-tungstenite`.
//!
//! This is a thin layer that just moves frames: connect performs the
//! CONNECT/CONNECTED handshake, after which a spawned task owns the
//! socket, sending queued frames and routing MESSAGE frames to the
//! handler registered for their subscription id. Session logic stays in
//! the transport-agnostic components.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex as StdMutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parley_proto::{Command, Frame};
use tokio::{
    net::TcpStream,
    sync::{Mutex, mpsc},
    task::AbortHandle,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use crate::{MessageHandler, SubscriptionHandle, Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type Handlers = Arc<StdMutex<HashMap<u64, MessageHandler>>>;

/// Time allowed to complete the CONNECT/CONNECTED handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// STOMP transport over a WebSocket connection.
pub struct StompTransport {
    url: String,
    conn: Mutex<Option<Conn>>,
    next_subscription: AtomicU64,
    handlers: Handlers,
}

/// Handle to the spawned connection task.
struct Conn {
    /// Outgoing frames, consumed by the connection task.
    frames: mpsc::Sender<Frame>,
    /// Stops the connection task on disconnect.
    abort: AbortHandle,
}

impl StompTransport {
    /// Create a transport targeting the broker's WebSocket endpoint.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            conn: Mutex::new(None),
            next_subscription: AtomicU64::new(1),
            handlers: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Sender for outgoing frames, if connected.
    async fn frame_sender(&self) -> Result<mpsc::Sender<Frame>, TransportError> {
        self.conn
            .lock()
            .await
            .as_ref()
            .map(|conn| conn.frames.clone())
            .ok_or_else(|| TransportError::Stream("not connected".to_string()))
    }

    async fn queue_frame(&self, frame: Frame) -> Result<(), TransportError> {
        self.frame_sender()
            .await?
            .send(frame)
            .await
            .map_err(|_| TransportError::Stream("connection task closed".to_string()))
    }
}

#[async_trait]
impl Transport for StompTransport {
    async fn connect(&self, headers: &[(String, String)]) -> Result<(), TransportError> {
        let mut conn = self.conn.lock().await;
        if conn.is_some() {
            return Ok(());
        }

        let (ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connection(format!("websocket connect: {e}")))?;

        let ws = handshake(ws, &self.url, headers).await?;

        let (frames_tx, frames_rx) = mpsc::channel::<Frame>(32);
        let task = tokio::spawn(run_connection(ws, frames_rx, Arc::clone(&self.handlers)));

        *conn = Some(Conn { frames: frames_tx, abort: task.abort_handle() });
        Ok(())
    }

    async fn send(&self, destination: &str, payload: &[u8]) -> Result<(), TransportError> {
        let frame = Frame::new(Command::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .header("content-length", payload.len().to_string())
            .with_body(payload.to_vec());

        self.queue_frame(frame).await
    }

    async fn subscribe(
        &self,
        destination: &str,
        handler: MessageHandler,
    ) -> Result<SubscriptionHandle, TransportError> {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        lock_handlers(&self.handlers).insert(id, handler);

        let frame = Frame::new(Command::Subscribe)
            .header("id", id.to_string())
            .header("destination", destination)
            .header("ack", "auto");

        if let Err(e) = self.queue_frame(frame).await {
            lock_handlers(&self.handlers).remove(&id);
            return Err(e);
        }

        Ok(SubscriptionHandle::new(id))
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), TransportError> {
        lock_handlers(&self.handlers).remove(&handle.id());

        let frame = Frame::new(Command::Unsubscribe).header("id", handle.id().to_string());
        self.queue_frame(frame).await
    }

    async fn disconnect(&self) {
        let Some(conn) = self.conn.lock().await.take() else {
            return;
        };

        // Best-effort goodbye; the broker drops the session either way.
        let _ = conn.frames.send(Frame::new(Command::Disconnect)).await;
        conn.abort.abort();
        lock_handlers(&self.handlers).clear();
    }
}

/// Send CONNECT and wait for CONNECTED (or ERROR) from the broker.
async fn handshake(
    mut ws: WsStream,
    url: &str,
    headers: &[(String, String)],
) -> Result<WsStream, TransportError> {
    let host = url.split('/').nth(2).unwrap_or(url);
    let mut connect = Frame::new(Command::Connect)
        .header("accept-version", "1.2")
        .header("host", host)
        .header("heart-beat", "0,0");
    for (name, value) in headers {
        connect = connect.header(name.clone(), value.clone());
    }

    ws.send(Message::Text(frame_text(&connect)?.into()))
        .await
        .map_err(|e| TransportError::Connection(format!("CONNECT send: {e}")))?;

    let deadline = tokio::time::Instant::now() + HANDSHAKE_TIMEOUT;
    loop {
        let message = tokio::time::timeout_at(deadline, ws.next())
            .await
            .map_err(|_| TransportError::Connection("handshake timeout".to_string()))?
            .ok_or_else(|| TransportError::Connection("socket closed during handshake".to_string()))?
            .map_err(|e| TransportError::Connection(format!("handshake read: {e}")))?;

        let Message::Text(text) = message else { continue };
        let frame = Frame::decode(text.as_bytes())
            .map_err(|e| TransportError::Protocol(format!("handshake frame: {e}")))?;

        match frame.command {
            Command::Connected => return Ok(ws),
            Command::Error => {
                let body = String::from_utf8_lossy(&frame.body).into_owned();
                return Err(TransportError::Connection(format!("broker refused: {body}")));
            },
            // Nothing else should arrive before CONNECTED; keep waiting
            // until the deadline rather than failing on stray frames.
            _ => {},
        }
    }
}

/// Connection task: send queued frames, route MESSAGE frames to handlers.
async fn run_connection(ws: WsStream, mut frames: mpsc::Receiver<Frame>, handlers: Handlers) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                let Ok(text) = frame_text(&frame) else { continue };
                if ws_tx.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            message = ws_rx.next() => {
                let Some(Ok(message)) = message else { break };
                match message {
                    Message::Text(text) => match Frame::decode(text.as_bytes()) {
                        Ok(frame) => dispatch(&handlers, &frame),
                        Err(e) => tracing::warn!(error = %e, "undecodable frame from broker"),
                    },
                    Message::Close(_) => break,
                    // Ping/pong are answered by tungstenite while reading.
                    _ => {},
                }
            }
        }
    }

    tracing::debug!("connection task stopped");
}

fn dispatch(handlers: &Handlers, frame: &Frame) {
    match frame.command {
        Command::Message => {
            let Some(id) =
                frame.header_value("subscription").and_then(|s| s.parse::<u64>().ok())
            else {
                tracing::warn!("MESSAGE frame without usable subscription header");
                return;
            };

            let handler = lock_handlers(handlers).get(&id).cloned();
            match handler {
                Some(handler) => handler(&frame.body),
                None => tracing::debug!(id, "message for unknown subscription, dropping"),
            }
        },
        Command::Error => {
            let body = String::from_utf8_lossy(&frame.body).into_owned();
            tracing::warn!(%body, "broker reported error");
        },
        _ => {},
    }
}

/// Frames travel as WebSocket text messages; bodies here are JSON, so the
/// encoded frame is always valid UTF-8.
fn frame_text(frame: &Frame) -> Result<String, TransportError> {
    String::from_utf8(frame.encode())
        .map_err(|e| TransportError::Protocol(format!("non-utf8 frame: {e}")))
}

/// A handler that panicked must not wedge the dispatch path.
fn lock_handlers(handlers: &StdMutex<HashMap<u64, MessageHandler>>) -> MutexGuard<'_, HashMap<u64, MessageHandler>> {
    match handlers.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
