use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartStatus {
    Active,
    Expired,
    Completed,
    Cancelled,
}

impl CartStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartStatus::Active => "ACTIVE",
            CartStatus::Expired => "EXPIRED",
            CartStatus::Completed => "COMPLETED",
            CartStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ACTIVE" => Some(CartStatus::Active),
            "EXPIRED" => Some(CartStatus::Expired),
            "COMPLETED" => Some(CartStatus::Completed),
            "CANCELLED" => Some(CartStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Option<Uuid>,
    pub status: CartStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Cart {
    /// A cart can take holds only while it is active and its expiry lies ahead.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == CartStatus::Active && self.expires_at > now
    }
}
