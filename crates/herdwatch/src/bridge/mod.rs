//! Telemetry Bridge
//!
//! Relays readings from a single upstream subscription to every connected
//! live-view session. The bridge keeps no history: a session only sees
//! readings that arrive after it registered, and a session whose write fails
//! or stalls is dropped without retry.

mod mqtt;
mod registry;
mod relay;
mod session;
mod upstream;

pub use mqtt::*;
pub use registry::*;
pub use relay::*;
pub use session::*;
pub use upstream::*;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry::ReadingError;

// ─────────────────────────────────────────────────────────────────────────────
// Bridge Error
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by the bridge and its transports
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Malformed upstream message: {0}")]
    MalformedMessage(#[from] ReadingError),

    #[error("Failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Bridge is closed")]
    Closed,

    #[error("Upstream connection failed: {0}")]
    UpstreamConnect(String),
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

// ─────────────────────────────────────────────────────────────────────────────
// Bridge Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Fan-out settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Upper bound on a single session write before the session is dropped
    pub write_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            write_timeout_ms: 2_000,
        }
    }
}

impl BridgeConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}
