//! HTTP / WebSocket Server
//!
//! Live-view clients connect to `/ws` and receive every relayed reading.
//! The geofence API under `/api/geofence` drives the operator workflow.

mod geofence;
mod handler;
mod protocol;
mod router;
mod state;

pub use geofence::*;
pub use handler::*;
pub use protocol::*;
pub use router::*;
pub use state::*;
