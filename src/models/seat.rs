use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::layout::SeatType;

/// Stored reservation status. This is only a hint: display status is always
/// recomputed by the projector from the raw fields and the current instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Held,
    Sold,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Held => "HELD",
            SeatStatus::Sold => "SOLD",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "AVAILABLE" => Some(SeatStatus::Available),
            "HELD" => Some(SeatStatus::Held),
            "SOLD" => Some(SeatStatus::Sold),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub session_id: Uuid,
    pub row_label: String,
    pub number: i32,
    /// Display id, e.g. `A1`. Unique within a session.
    pub seat_id: String,
    pub seat_type: SeatType,
    pub status: SeatStatus,
    pub held_until: Option<DateTime<Utc>>,
    pub held_by_cart_id: Option<Uuid>,
    pub sold_at: Option<DateTime<Utc>>,
    pub sold_cart_id: Option<Uuid>,
}

/// A seat coordinate produced by the generator, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSeat {
    pub session_id: Uuid,
    pub row_label: String,
    pub number: i32,
    pub seat_id: String,
    pub seat_type: SeatType,
}

impl NewSeat {
    pub fn into_seat(self) -> Seat {
        Seat {
            id: Uuid::new_v4(),
            session_id: self.session_id,
            row_label: self.row_label,
            number: self.number,
            seat_id: self.seat_id,
            seat_type: self.seat_type,
            status: SeatStatus::Available,
            held_until: None,
            held_by_cart_id: None,
            sold_at: None,
            sold_cart_id: None,
        }
    }
}

pub fn display_seat_id(row_label: &str, number: i32) -> String {
    format!("{}{}", row_label, number)
}
