use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The part of a screening the inventory needs: which auditorium it plays in.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub auditorium_id: Uuid,
    pub starts_at: DateTime<Utc>,
}
