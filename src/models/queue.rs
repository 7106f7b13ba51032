use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    Waiting,
    Admitted,
    Done,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Waiting => "WAITING",
            QueueStatus::Admitted => "ADMITTED",
            QueueStatus::Done => "DONE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "WAITING" => Some(QueueStatus::Waiting),
            "ADMITTED" => Some(QueueStatus::Admitted),
            "DONE" => Some(QueueStatus::Done),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub scope_key: String,
    pub user_id: Option<Uuid>,
    pub cart_id: Option<Uuid>,
    pub queue_number: i64,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub admitted_at: Option<DateTime<Utc>>,
}
