//! HTTP Router
//!
//! Sets up the axum router with the WebSocket feed and the geofence API.

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::geofence::{add_point, classify_point, get_fence, reset_fence, save_fence};
use super::handler::handle_websocket;
use super::protocol::HealthResponse;
use super::state::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Live telemetry feed
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health_check))
        .route("/api/geofence", get(get_fence).delete(reset_fence))
        .route("/api/geofence/points", post(add_point))
        .route("/api/geofence/save", post(save_fence))
        .route("/api/geofence/classify", post(classify_point))
        .layer(TraceLayer::new_for_http())
        // CORS for the dashboard dev server
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// WebSocket upgrade handler
async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::from(state.bridge().stats()))
}
