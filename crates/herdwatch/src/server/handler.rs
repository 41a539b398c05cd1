//! WebSocket Connection Handler
//!
//! Each accepted socket becomes one live-view session. The write half is
//! handed to the bridge; this task only watches the read half so it can
//! unregister the session when the client leaves.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::{Mutex, Notify};

use super::state::AppState;
use crate::bridge::{FrameSink, SessionError};

/// Write half of a WebSocket exposed to the bridge
pub struct WsFrameSink {
    sender: Mutex<SplitSink<WebSocket, Message>>,
    closed: Arc<Notify>,
}

impl WsFrameSink {
    /// Wrap the write half; `closed` is notified once the bridge closes it
    pub fn new(sender: SplitSink<WebSocket, Message>, closed: Arc<Notify>) -> Self {
        Self {
            sender: Mutex::new(sender),
            closed,
        }
    }
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send(&self, frame: Arc<str>) -> Result<(), SessionError> {
        self.sender
            .lock()
            .await
            .send(Message::Text(frame.to_string()))
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn close(&self) {
        // Release the read loop first; the handshake may be abandoned
        self.closed.notify_one();

        let mut sender = self.sender.lock().await;
        let _ = sender.send(Message::Close(None)).await;
        let _ = sender.close().await;
    }
}

/// Handle a WebSocket connection
pub async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let closed = Arc::new(Notify::new());

    let session = match state
        .bridge()
        .open_session(WsFrameSink::new(ws_sender, Arc::clone(&closed)))
        .await
    {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("Rejected live-view connection: {}", e);
            return;
        }
    };
    let session_id = session.id();

    // Receive-only feed: client frames are read only to notice disconnects
    loop {
        tokio::select! {
            msg = ws_receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                    tracing::trace!(session_id = %session_id, "Ignoring client frame");
                }
                Some(Ok(_)) => {
                    // Ping/pong is answered by axum
                }
                Some(Err(e)) => {
                    tracing::debug!(session_id = %session_id, "WebSocket read error: {}", e);
                    break;
                }
            },
            _ = closed.notified() => break,
        }
    }

    state.bridge().close_session(session_id).await;
}
