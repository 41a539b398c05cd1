//! Geofence Workflow
//!
//! Operator-side state around one boundary: drawing, saving, restoring, and
//! the simulated herd regenerated whenever the boundary changes.

mod editor;
mod store;

pub use editor::*;
pub use store::*;

use std::path::PathBuf;

use herdwatch_geo::GeneratorConfig;
use serde::{Deserialize, Serialize};

/// Geofence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeofenceConfig {
    /// JSON file holding persisted client state
    pub store_path: PathBuf,

    /// Key the saved fence lives under
    pub fence_key: String,

    /// Simulated herd parameters
    pub generator: GeneratorConfig,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("herdwatch-state.json"),
            fence_key: "savedFence".to_string(),
            generator: GeneratorConfig::default(),
        }
    }
}
