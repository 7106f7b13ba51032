use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error("no auditorium layout for session {0}")]
    LayoutMissing(Uuid),

    #[error("invalid auditorium layout: {0}")]
    InvalidLayout(String),

    #[error("cart {0} not found")]
    CartNotFound(Uuid),

    #[error("cart {0} is no longer active")]
    CartNotActive(Uuid),

    /// Hold contention. Expected under load; the caller should reselect.
    #[error("seats already taken: {}", seat_ids.join(", "))]
    SeatOccupied { seat_ids: Vec<String> },

    #[error("session {0} already has sold seats")]
    SeatsAlreadySold(Uuid),

    #[error("queue entry {0} not found")]
    QueueEntryNotFound(Uuid),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type InventoryResult<T> = Result<T, InventoryError>;

impl InventoryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            InventoryError::SessionNotFound(_)
            | InventoryError::CartNotFound(_)
            | InventoryError::QueueEntryNotFound(_) => StatusCode::NOT_FOUND,
            InventoryError::LayoutMissing(_)
            | InventoryError::InvalidLayout(_)
            | InventoryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            InventoryError::SeatOccupied { .. }
            | InventoryError::SeatsAlreadySold(_)
            | InventoryError::CartNotActive(_) => StatusCode::CONFLICT,
            InventoryError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for InventoryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            InventoryError::SeatOccupied { seat_ids } => serde_json::json!({
                "success": false,
                "error": "Some of your seats were just taken, please reselect",
                "seat_ids": seat_ids,
            }),
            InventoryError::Database(e) => {
                tracing::error!("database error: {:?}", e);
                serde_json::json!({
                    "success": false,
                    "error": "Internal error",
                })
            }
            other => serde_json::json!({
                "success": false,
                "error": other.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for InventoryError {
    fn from(errors: validator::ValidationErrors) -> Self {
        InventoryError::InvalidRequest(errors.to_string())
    }
}
