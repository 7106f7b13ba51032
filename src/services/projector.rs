//! Display status of seats.
//!
//! The stored `status` column is only a hint. A hold whose `held_until` has
//! passed is reported `AVAILABLE` right away, even if the reclaimer has not
//! cleared the row yet.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::{Seat, SeatStatus, SeatType};

/// Rules, first match wins:
/// 1. any sale marker (owner, timestamp or stored status) -> `SOLD`
/// 2. stored `HELD` with an owner and `held_until` strictly after `now` -> `HELD`
/// 3. otherwise -> `AVAILABLE`
pub fn project_seat_state(seat: &Seat, now: DateTime<Utc>) -> SeatStatus {
    if seat.sold_cart_id.is_some() || seat.sold_at.is_some() || seat.status == SeatStatus::Sold {
        return SeatStatus::Sold;
    }
    let live_hold = seat.status == SeatStatus::Held
        && seat.held_by_cart_id.is_some()
        && seat.held_until.is_some_and(|until| until > now);
    if live_hold {
        SeatStatus::Held
    } else {
        SeatStatus::Available
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectedSeat {
    pub seat_id: String,
    pub row_label: String,
    pub number: i32,
    pub seat_type: SeatType,
    pub status: SeatStatus,
    /// Only set while the hold is live.
    pub held_until: Option<DateTime<Utc>>,
    /// True when the live hold belongs to the cart viewing the map.
    pub mine: bool,
}

pub fn project_seat(seat: &Seat, now: DateTime<Utc>, viewer: Option<Uuid>) -> ProjectedSeat {
    let status = project_seat_state(seat, now);
    let held = status == SeatStatus::Held;
    ProjectedSeat {
        seat_id: seat.seat_id.clone(),
        row_label: seat.row_label.clone(),
        number: seat.number,
        seat_type: seat.seat_type,
        status,
        held_until: seat.held_until.filter(|_| held),
        mine: held && viewer.is_some() && seat.held_by_cart_id == viewer,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatMapRow {
    pub label: String,
    pub seats: Vec<ProjectedSeat>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub available: usize,
    pub held: usize,
    pub sold: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatMap {
    pub session_id: Uuid,
    pub rows: Vec<SeatMapRow>,
    /// Bookable seats only; gaps are drawn but never counted.
    pub counts: StatusCounts,
}

/// Groups seats by row label. Rows sort lexicographically, seats within a
/// row by number (`A2` before `A10`).
pub fn project_seat_map(
    session_id: Uuid,
    seats: &[Seat],
    now: DateTime<Utc>,
    viewer: Option<Uuid>,
) -> SeatMap {
    let mut rows: BTreeMap<&str, Vec<ProjectedSeat>> = BTreeMap::new();
    let mut counts = StatusCounts::default();

    for seat in seats {
        let projected = project_seat(seat, now, viewer);
        if seat.seat_type.is_bookable() {
            match projected.status {
                SeatStatus::Available => counts.available += 1,
                SeatStatus::Held => counts.held += 1,
                SeatStatus::Sold => counts.sold += 1,
            }
        }
        rows.entry(seat.row_label.as_str()).or_default().push(projected);
    }

    let rows = rows
        .into_iter()
        .map(|(label, mut seats)| {
            seats.sort_by_key(|s| s.number);
            SeatMapRow {
                label: label.to_string(),
                seats,
            }
        })
        .collect();

    SeatMap {
        session_id,
        rows,
        counts,
    }
}
