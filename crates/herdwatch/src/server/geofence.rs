//! Geofence API Handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::protocol::{ClassifyResponse, ErrorResponse, FenceView, PointRequest};
use super::state::AppState;
use crate::geofence::FenceError;

impl IntoResponse for FenceError {
    fn into_response(self) -> Response {
        let status = match &self {
            FenceError::Locked => StatusCode::CONFLICT,
            FenceError::Empty => StatusCode::BAD_REQUEST,
            FenceError::Store(e) => {
                tracing::error!("Fence store failure: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Current fence, lock state, and herd
pub async fn get_fence(State(state): State<AppState>) -> Json<FenceView> {
    let editor = state.fence().read().await;
    Json(FenceView::from(&*editor))
}

/// Append a vertex while drawing
pub async fn add_point(
    State(state): State<AppState>,
    Json(point): Json<PointRequest>,
) -> Result<Json<FenceView>, FenceError> {
    let mut editor = state.fence().write().await;
    editor.add_point(point.into())?;
    Ok(Json(FenceView::from(&*editor)))
}

/// Persist and lock the fence
pub async fn save_fence(State(state): State<AppState>) -> Result<Json<FenceView>, FenceError> {
    let mut editor = state.fence().write().await;
    editor.save().await?;
    Ok(Json(FenceView::from(&*editor)))
}

/// Clear the fence and its persisted copy
pub async fn reset_fence(State(state): State<AppState>) -> Result<Json<FenceView>, FenceError> {
    let mut editor = state.fence().write().await;
    editor.reset().await?;
    Ok(Json(FenceView::from(&*editor)))
}

/// Classify one point against the current fence
pub async fn classify_point(
    State(state): State<AppState>,
    Json(point): Json<PointRequest>,
) -> Json<ClassifyResponse> {
    let editor = state.fence().read().await;
    Json(ClassifyResponse {
        inside: editor.classify(point.into()),
    })
}
