use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::InventoryError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/queue/entries/{id}", get(queue_position))
        .route("/queue/entries/{id}/complete", post(complete_entry))
        .route("/queue/scopes/{scope}", post(join_queue))
        .route("/queue/scopes/{scope}/admit", post(admit_next))
        .route("/reclaim", post(reclaim))
}

#[derive(Debug, Deserialize)]
struct JoinQueueRequest {
    user_id: Option<Uuid>,
    cart_id: Option<Uuid>,
}

// POST /api/queue/scopes/{scope}
async fn join_queue(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
    Json(req): Json<JoinQueueRequest>,
) -> Result<impl IntoResponse, InventoryError> {
    let ticket = state
        .inventory
        .allocate_queue_number(&scope, req.user_id, req.cart_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

#[derive(Debug, Deserialize, Validate)]
struct AdmitRequest {
    #[validate(range(min = 1, max = 10000))]
    capacity: Option<i64>,
}

// POST /api/queue/scopes/{scope}/admit
async fn admit_next(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
    Json(req): Json<AdmitRequest>,
) -> Result<impl IntoResponse, InventoryError> {
    req.validate()?;
    let admitted = state.inventory.admit_next(&scope, req.capacity).await?;
    Ok(Json(serde_json::json!({
        "admitted": admitted,
    })))
}

// GET /api/queue/entries/{id}
async fn queue_position(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
) -> Result<impl IntoResponse, InventoryError> {
    let position = state.inventory.queue_position(entry_id).await?;
    Ok(Json(position))
}

// POST /api/queue/entries/{id}/complete
async fn complete_entry(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
) -> Result<impl IntoResponse, InventoryError> {
    let entry = state.inventory.complete_queue_entry(entry_id).await?;
    Ok(Json(entry))
}

// POST /api/reclaim
async fn reclaim(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, InventoryError> {
    let report = state.inventory.release_expired_reservations().await?;
    Ok(Json(report))
}
