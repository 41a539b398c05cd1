//! Server Application State
//!
//! Shared state accessible by all handlers.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::bridge::TelemetryBridge;
use crate::geofence::FenceEditor;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Telemetry relay owning the live-view sessions
    bridge: TelemetryBridge,

    /// Operator fence; one writer at a time
    fence: RwLock<FenceEditor>,
}

impl AppState {
    pub fn new(bridge: TelemetryBridge, fence: FenceEditor) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                bridge,
                fence: RwLock::new(fence),
            }),
        }
    }

    pub fn bridge(&self) -> &TelemetryBridge {
        &self.inner.bridge
    }

    pub fn fence(&self) -> &RwLock<FenceEditor> {
        &self.inner.fence
    }
}
