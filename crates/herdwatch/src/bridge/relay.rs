//! Bridge Core
//!
//! Parses upstream payloads and fans them out to the session registry.
//! Fan-out for one message finishes (delivered, failed, or timed out on every
//! session) before the next message is written, so all sessions observe the
//! same order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, broadcast, watch};
use tracing::{debug, info, warn};

use super::registry::SessionRegistry;
use super::session::{FrameSink, LiveViewSession, SessionId};
use super::upstream::{UpstreamEvent, UpstreamSource, UpstreamStatus};
use super::{BridgeConfig, BridgeError, BridgeResult};
use crate::telemetry::Reading;

/// Outcome of broadcasting one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions that accepted the frame
    pub delivered: usize,
    /// Sessions dropped because the write failed or timed out
    pub dropped: usize,
}

/// Point-in-time bridge counters
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeStats {
    pub sessions: usize,
    pub upstream: UpstreamStatus,
    pub messages_relayed: u64,
    pub messages_dropped: u64,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Relay from one upstream subscription to many live-view sessions
#[derive(Clone)]
pub struct TelemetryBridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,

    /// Registered sessions
    sessions: SessionRegistry,

    /// Serializes fan-out so frames never interleave across sessions
    fanout: AsyncMutex<()>,

    /// Upstream status, observable by the server
    status_tx: watch::Sender<UpstreamStatus>,

    /// Signals the upstream loop to stop
    shutdown_tx: broadcast::Sender<()>,

    closed: AtomicBool,
    relayed: AtomicU64,
    malformed: AtomicU64,
    last_message_at: Mutex<Option<DateTime<Utc>>>,
}

impl TelemetryBridge {
    /// Create a bridge with no sessions and an upstream still connecting
    pub fn new(config: BridgeConfig) -> Self {
        let (status_tx, _) = watch::channel(UpstreamStatus::Connecting);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            inner: Arc::new(BridgeInner {
                config,
                sessions: SessionRegistry::new(),
                fanout: AsyncMutex::new(()),
                status_tx,
                shutdown_tx,
                closed: AtomicBool::new(false),
                relayed: AtomicU64::new(0),
                malformed: AtomicU64::new(0),
                last_message_at: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a new downstream connection
    ///
    /// Nothing is replayed; the session receives the next message relayed
    /// after this returns.
    pub async fn open_session(&self, sink: impl FrameSink) -> BridgeResult<Arc<LiveViewSession>> {
        let session = Arc::new(LiveViewSession::new(sink));

        if self.is_closed() {
            session.close().await;
            return Err(BridgeError::Closed);
        }

        self.inner.sessions.insert(Arc::clone(&session));

        // Shutdown may have drained the registry between the check and insert
        if self.is_closed() {
            self.close_session(session.id()).await;
            return Err(BridgeError::Closed);
        }

        info!(session_id = %session.id(), sessions = self.session_count(), "Live-view session opened");
        Ok(session)
    }

    /// Unregister and close a session
    ///
    /// Safe to call repeatedly; returns `true` only for the call that removed
    /// the session.
    pub async fn close_session(&self, id: SessionId) -> bool {
        match self.inner.sessions.remove(&id) {
            Some(session) => {
                session.close().await;
                info!(session_id = %id, sessions = self.session_count(), "Live-view session closed");
                true
            }
            None => false,
        }
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Relay
    // ─────────────────────────────────────────────────────────────────────────

    /// Handle one raw upstream payload
    ///
    /// Malformed payloads are logged and dropped; they never reach a session.
    pub async fn on_upstream_message(&self, raw: &[u8]) -> BridgeResult<BroadcastReport> {
        if self.is_closed() {
            return Err(BridgeError::Closed);
        }

        let reading = match Reading::from_slice(raw) {
            Ok(reading) => reading,
            Err(e) => {
                self.inner.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    error = %e,
                    payload = %String::from_utf8_lossy(raw),
                    "Dropping malformed upstream message"
                );
                return Err(e.into());
            }
        };

        let frame: Arc<str> = reading.to_frame().map_err(BridgeError::Encode)?.into();
        let report = self.broadcast(frame).await;

        self.inner.relayed.fetch_add(1, Ordering::Relaxed);
        *self.inner.last_message_at.lock() = Some(Utc::now());

        debug!(
            entity_id = ?reading.entity_id(),
            delivered = report.delivered,
            dropped = report.dropped,
            "Relayed reading"
        );
        Ok(report)
    }

    /// Write a frame to every registered session
    ///
    /// Sessions whose write fails are unregistered under the fan-out lock and
    /// closed in the background, so their close handshakes never delay the
    /// next frame.
    async fn broadcast(&self, frame: Arc<str>) -> BroadcastReport {
        let guard = self.inner.fanout.lock().await;

        let sessions = self.inner.sessions.snapshot();
        let timeout = self.inner.config.write_timeout();

        let writes = sessions.iter().map(|session| {
            let frame = Arc::clone(&frame);
            async move { (session, session.deliver(frame, timeout).await) }
        });

        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();
        for (session, result) in join_all(writes).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(session_id = %session.id(), error = %e, "Dropping live-view session after failed write");
                    report.dropped += 1;
                    if let Some(session) = self.inner.sessions.remove(&session.id()) {
                        failed.push(session);
                    }
                }
            }
        }
        drop(guard);

        if !failed.is_empty() {
            let remaining = self.session_count();
            tokio::spawn(async move {
                join_all(failed.iter().map(|session| session.close())).await;
                debug!(closed = failed.len(), sessions = remaining, "Closed failed live-view sessions");
            });
        }

        report
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Upstream
    // ─────────────────────────────────────────────────────────────────────────

    /// Current upstream status
    pub fn status(&self) -> UpstreamStatus {
        *self.inner.status_tx.borrow()
    }

    /// Watch upstream status changes
    pub fn subscribe_status(&self) -> watch::Receiver<UpstreamStatus> {
        self.inner.status_tx.subscribe()
    }

    fn set_status(&self, status: UpstreamStatus) {
        if self.is_closed() && status != UpstreamStatus::Closed {
            return;
        }

        let changed = self.inner.status_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });

        if changed {
            info!(status = %status, "Upstream status changed");
        }
    }

    /// Drive the bridge from an upstream source until shutdown or exhaustion
    pub async fn run<U: UpstreamSource>(&self, mut upstream: U) {
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();

        if !self.is_closed() {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    event = upstream.next_event() => match event {
                        Some(UpstreamEvent::Connected) => {
                            self.set_status(UpstreamStatus::Connected);
                        }
                        Some(UpstreamEvent::Message(payload)) => {
                            match self.on_upstream_message(&payload).await {
                                // Malformed payloads are logged where they are parsed
                                Ok(_) | Err(BridgeError::MalformedMessage(_)) => {}
                                Err(e) => warn!(error = %e, "Failed to relay upstream message"),
                            }
                        }
                        Some(UpstreamEvent::Disconnected(reason)) => {
                            warn!(reason = %reason, "Upstream connection lost");
                            self.set_status(UpstreamStatus::Disconnected);
                        }
                        None => {
                            info!("Upstream source ended");
                            self.set_status(UpstreamStatus::Disconnected);
                            break;
                        }
                    },
                }
            }
        }

        upstream.close().await;
        debug!("Upstream loop stopped");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shutdown
    // ─────────────────────────────────────────────────────────────────────────

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Stop the upstream loop and close every session
    ///
    /// Terminal: later sessions are rejected and later messages ignored.
    pub async fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("Shutting down telemetry bridge");
        self.set_status(UpstreamStatus::Closed);
        let _ = self.inner.shutdown_tx.send(());

        let sessions = self.inner.sessions.drain();
        let count = sessions.len();
        join_all(sessions.iter().map(|session| session.close())).await;

        info!(sessions = count, "Telemetry bridge closed");
    }

    /// Snapshot of the bridge counters
    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            sessions: self.session_count(),
            upstream: self.status(),
            messages_relayed: self.inner.relayed.load(Ordering::Relaxed),
            messages_dropped: self.inner.malformed.load(Ordering::Relaxed),
            last_message_at: *self.inner.last_message_at.lock(),
        }
    }
}
