use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
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
        .route("/sessions/{id}/carts", post(open_cart))
        .route("/carts/{id}/holds", post(hold_seats).delete(release_seats))
        .route("/carts/{id}/purchase", post(purchase))
}

/* ---------- CARTS ---------- */

#[derive(Debug, Deserialize)]
struct OpenCartRequest {
    user_id: Option<Uuid>,
}

// POST /api/sessions/{id}/carts
async fn open_cart(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<OpenCartRequest>,
) -> Result<impl IntoResponse, InventoryError> {
    let cart = state.inventory.open_cart(session_id, req.user_id).await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

/* ---------- HOLDS ---------- */

#[derive(Debug, Deserialize, Validate)]
struct HoldSeatsRequest {
    #[validate(length(min = 1, message = "seat_ids must not be empty"))]
    seat_ids: Vec<String>,
    #[validate(range(min = 1))]
    ttl_minutes: Option<u32>,
}

// POST /api/carts/{id}/holds
async fn hold_seats(
    State(state): State<Arc<AppState>>,
    Path(cart_id): Path<Uuid>,
    Json(req): Json<HoldSeatsRequest>,
) -> Result<impl IntoResponse, InventoryError> {
    req.validate()?;
    let held = state
        .inventory
        .hold_seats(cart_id, &req.seat_ids, req.ttl_minutes)
        .await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "held_until": held.held_until,
        "held_seat_ids": held.held_seat_ids,
    })))
}

#[derive(Debug, Deserialize)]
struct ReleaseSeatsRequest {
    // empty releases every seat the cart holds and cancels it
    #[serde(default)]
    seat_ids: Vec<String>,
}

// DELETE /api/carts/{id}/holds
async fn release_seats(
    State(state): State<Arc<AppState>>,
    Path(cart_id): Path<Uuid>,
    Json(req): Json<ReleaseSeatsRequest>,
) -> Result<impl IntoResponse, InventoryError> {
    let released = state.inventory.release_seats(cart_id, &req.seat_ids).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "released_seat_ids": released,
    })))
}

// POST /api/carts/{id}/purchase
async fn purchase(
    State(state): State<Arc<AppState>>,
    Path(cart_id): Path<Uuid>,
) -> Result<impl IntoResponse, InventoryError> {
    let sold = state.inventory.sell_held_seats(cart_id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "sold_seat_ids": sold,
    })))
}
