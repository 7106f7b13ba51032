use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::InventoryError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions/{id}/seats", get(get_seat_map))
        .route("/sessions/{id}/seats/generate", post(generate_seats))
        .route("/sessions/{id}/seats/regenerate", post(regenerate_seats))
}

#[derive(Debug, Deserialize)]
struct SeatMapQuery {
    cart_id: Option<Uuid>,
}

// GET /api/sessions/{id}/seats?cart_id=
async fn get_seat_map(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<SeatMapQuery>,
) -> Result<impl IntoResponse, InventoryError> {
    let map = state.inventory.seat_map(session_id, params.cart_id).await?;
    Ok(Json(map))
}

// POST /api/sessions/{id}/seats/generate
async fn generate_seats(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, InventoryError> {
    let outcome = state.inventory.generate_seats_for_session(session_id).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

// POST /api/sessions/{id}/seats/regenerate
async fn regenerate_seats(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, InventoryError> {
    let outcome = state.inventory.regenerate_seats_for_session(session_id).await?;
    Ok(Json(outcome))
}
