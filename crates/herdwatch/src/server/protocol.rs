//! API Messages
//!
//! Request and response bodies of the HTTP API. Live-view frames are the
//! normalized readings themselves and are not wrapped in an envelope.

use chrono::{DateTime, Utc};
use herdwatch_geo::{LatLng, TrackedEntity};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::bridge::{BridgeStats, UpstreamStatus};
use crate::geofence::FenceEditor;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Open live-view sessions
    pub sessions: usize,
    pub upstream: UpstreamStatus,
    /// When the last reading was relayed; stale means no live data
    pub last_message_at: Option<DateTime<Utc>>,
    pub messages_relayed: u64,
    pub messages_dropped: u64,
}

impl From<BridgeStats> for HealthResponse {
    fn from(stats: BridgeStats) -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            sessions: stats.sessions,
            upstream: stats.upstream,
            last_message_at: stats.last_message_at,
            messages_relayed: stats.messages_relayed,
            messages_dropped: stats.messages_dropped,
        }
    }
}

/// A single coordinate in a request body
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PointRequest {
    pub lat: f64,
    pub lng: f64,
}

impl From<PointRequest> for LatLng {
    fn from(p: PointRequest) -> Self {
        LatLng::new(p.lat, p.lng)
    }
}

/// Result of classifying one point
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClassifyResponse {
    pub inside: bool,
}

/// One simulated animal on the map
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EntityView {
    pub id: String,
    pub name: String,
    pub device: String,
    pub lat: f64,
    pub lng: f64,
    pub is_inside: bool,
}

impl From<&TrackedEntity> for EntityView {
    fn from(entity: &TrackedEntity) -> Self {
        let position = entity.position();
        Self {
            id: entity.id().to_string(),
            name: entity.name().to_string(),
            device: entity.device().to_string(),
            lat: position.lat,
            lng: position.lng,
            is_inside: entity.is_inside(),
        }
    }
}

/// Current fence and its herd
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FenceView {
    /// Vertices as `[lat, lng]` pairs, in drawing order
    pub points: Vec<(f64, f64)>,
    /// Saved and read-only until reset
    pub locked: bool,
    /// Enough vertices to enclose an area
    pub active: bool,
    pub inside: Vec<EntityView>,
    pub outside: Vec<EntityView>,
    pub inside_count: usize,
    pub outside_count: usize,
}

impl From<&FenceEditor> for FenceView {
    fn from(editor: &FenceEditor) -> Self {
        let split = editor.partition();
        let inside: Vec<EntityView> = split.inside.into_iter().map(EntityView::from).collect();
        let outside: Vec<EntityView> = split.outside.into_iter().map(EntityView::from).collect();

        Self {
            points: editor.boundary().vertices().iter().map(|p| (*p).into()).collect(),
            locked: editor.is_locked(),
            active: editor.boundary().is_active(),
            inside_count: inside.len(),
            outside_count: outside.len(),
            inside,
            outside,
        }
    }
}

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_serialize() {
        let health = HealthResponse::from(BridgeStats {
            sessions: 2,
            upstream: UpstreamStatus::Disconnected,
            messages_relayed: 10,
            messages_dropped: 1,
            last_message_at: None,
        });
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["upstream"], "disconnected");
        assert_eq!(json["sessions"], 2);
        assert!(json["last_message_at"].is_null());
    }

    #[test]
    fn test_point_request_deserialize() {
        let req: PointRequest = serde_json::from_str(r#"{"lat":12.97,"lng":77.59}"#).unwrap();
        let point: LatLng = req.into();
        assert_eq!(point, LatLng::new(12.97, 77.59));
    }
}
