//! Upstream Sources
//!
//! The bridge consumes a single ordered stream of transport events. The
//! transport owns reconnection; the bridge only observes status changes.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use ts_rs::TS;

/// Connection status of the upstream feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamStatus {
    /// Waiting for the first connection
    Connecting,
    /// Subscribed and receiving
    Connected,
    /// Connection lost; the transport is retrying
    Disconnected,
    /// Bridge shut down
    Closed,
}

impl std::fmt::Display for UpstreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamStatus::Connecting => write!(f, "connecting"),
            UpstreamStatus::Connected => write!(f, "connected"),
            UpstreamStatus::Disconnected => write!(f, "disconnected"),
            UpstreamStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Event delivered by an upstream transport
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    /// (Re)connected and subscribed
    Connected,
    /// One message payload, in broker order
    Message(Bytes),
    /// Connection lost
    Disconnected(String),
}

/// A single upstream subscription
#[async_trait]
pub trait UpstreamSource: Send + 'static {
    /// Wait for the next event; `None` once the source is exhausted
    async fn next_event(&mut self) -> Option<UpstreamEvent>;

    /// Tear down the subscription
    async fn close(&mut self);
}

/// Upstream fed from an in-process channel
///
/// Used to embed the bridge behind a transport that is driven elsewhere.
pub struct ChannelUpstream {
    rx: mpsc::Receiver<UpstreamEvent>,
}

impl ChannelUpstream {
    /// Create a source and the sender that feeds it
    pub fn new(capacity: usize) -> (mpsc::Sender<UpstreamEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait]
impl UpstreamSource for ChannelUpstream {
    async fn next_event(&mut self) -> Option<UpstreamEvent> {
        self.rx.recv().await
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}
