//! Live-View Sessions
//!
//! A session wraps one downstream connection behind the [`FrameSink`] trait
//! so the bridge never touches transport types directly.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Session identifier
pub type SessionId = Uuid;

/// Upper bound on closing a sink; a peer that never acknowledges is abandoned
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors that can occur while writing to a session
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("Session closed")]
    Closed,

    #[error("Write timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Session State
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of a session; `Closed` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Open = 0,
    Closed = 1,
}

impl SessionState {
    /// Convert from u8
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Open,
            _ => Self::Closed,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Open => write!(f, "open"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame Sink
// ─────────────────────────────────────────────────────────────────────────────

/// Write half of a downstream connection
#[async_trait]
pub trait FrameSink: Send + Sync + 'static {
    /// Write one text frame
    async fn send(&self, frame: Arc<str>) -> Result<(), SessionError>;

    /// Close the connection; called at most once per session and abandoned
    /// after [`CLOSE_TIMEOUT`]
    async fn close(&self);
}

// ─────────────────────────────────────────────────────────────────────────────
// Live-View Session
// ─────────────────────────────────────────────────────────────────────────────

/// One accepted downstream consumer
pub struct LiveViewSession {
    id: SessionId,
    state: AtomicU8,
    opened_at: DateTime<Utc>,
    sink: Box<dyn FrameSink>,
}

impl LiveViewSession {
    /// Wrap a sink in a new open session
    pub fn new(sink: impl FrameSink) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: AtomicU8::new(SessionState::Open as u8),
            opened_at: Utc::now(),
            sink: Box::new(sink),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Write a frame, failing if the sink does not finish within `timeout`
    pub async fn deliver(&self, frame: Arc<str>, timeout: Duration) -> Result<(), SessionError> {
        if !self.is_open() {
            return Err(SessionError::Closed);
        }

        match tokio::time::timeout(timeout, self.sink.send(frame)).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::Timeout(timeout)),
        }
    }

    /// Transition to `Closed` and close the sink
    ///
    /// Returns `false` if the session was already closed.
    pub async fn close(&self) -> bool {
        let transitioned = self
            .state
            .compare_exchange(
                SessionState::Open as u8,
                SessionState::Closed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if transitioned && tokio::time::timeout(CLOSE_TIMEOUT, self.sink.close()).await.is_err() {
            tracing::debug!(session_id = %self.id, "Sink close timed out");
        }
        transitioned
    }
}

impl std::fmt::Debug for LiveViewSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveViewSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("opened_at", &self.opened_at)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test Sinks
// ─────────────────────────────────────────────────────────────────────────────
