use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::InventoryError;
use crate::models::seat::display_seat_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatType {
    Standard,
    Vip,
    Wheelchair,
    Gap,
}

impl SeatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatType::Standard => "STANDARD",
            SeatType::Vip => "VIP",
            SeatType::Wheelchair => "WHEELCHAIR",
            SeatType::Gap => "GAP",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "STANDARD" => Some(SeatType::Standard),
            "VIP" => Some(SeatType::Vip),
            "WHEELCHAIR" => Some(SeatType::Wheelchair),
            "GAP" => Some(SeatType::Gap),
            _ => None,
        }
    }

    /// Gaps are physical holes in a row; they occupy a number but can never be held.
    pub fn is_bookable(&self) -> bool {
        !matches!(self, SeatType::Gap)
    }
}

/// One row of an auditorium. Seats are numbered `1..=seat_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowLayout {
    pub label: String,
    pub seat_count: u32,
    /// Seat number -> type. Numbers without an entry are `STANDARD`.
    #[serde(default)]
    pub overrides: BTreeMap<u32, SeatType>,
}

impl RowLayout {
    pub fn new(label: impl Into<String>, seat_count: u32) -> Self {
        Self {
            label: label.into(),
            seat_count,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_type(mut self, numbers: impl IntoIterator<Item = u32>, seat_type: SeatType) -> Self {
        for number in numbers {
            self.overrides.insert(number, seat_type);
        }
        self
    }

    pub fn seat_type(&self, number: u32) -> SeatType {
        self.overrides
            .get(&number)
            .copied()
            .unwrap_or(SeatType::Standard)
    }
}

/// Static description of an auditorium, stored as JSONB on the auditorium row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditoriumLayout {
    pub rows: Vec<RowLayout>,
}

impl AuditoriumLayout {
    pub fn new(rows: Vec<RowLayout>) -> Self {
        Self { rows }
    }

    pub fn total_seats(&self) -> usize {
        self.rows.iter().map(|r| r.seat_count as usize).sum()
    }

    /// Rejects layouts whose rows would not expand to distinct seats. Labels
    /// must be unique, and so must the display ids built from them: row `A`
    /// seat 11 and row `A1` seat 1 both read `A11`.
    pub fn validate(&self) -> Result<(), InventoryError> {
        let mut labels = HashSet::with_capacity(self.rows.len());
        let mut seat_ids = HashSet::new();
        for row in &self.rows {
            let label = row.label.trim();
            if label.is_empty() {
                return Err(InventoryError::InvalidLayout("row label is empty".to_string()));
            }
            if !labels.insert(label) {
                return Err(InventoryError::InvalidLayout(format!(
                    "duplicate row label '{}'",
                    label
                )));
            }
            if let Some(number) = row.overrides.keys().find(|n| **n == 0 || **n > row.seat_count) {
                return Err(InventoryError::InvalidLayout(format!(
                    "row '{}' overrides seat {} outside 1..={}",
                    label, number, row.seat_count
                )));
            }
            let Ok(seat_count) = i32::try_from(row.seat_count) else {
                return Err(InventoryError::InvalidLayout(format!(
                    "row '{}' has {} seats, more than {}",
                    label,
                    row.seat_count,
                    i32::MAX
                )));
            };
            for number in 1..=seat_count {
                let seat_id = display_seat_id(label, number);
                if !seat_ids.insert(seat_id.clone()) {
                    return Err(InventoryError::InvalidLayout(format!(
                        "seat id '{}' appears twice (row '{}')",
                        seat_id, label
                    )));
                }
            }
        }
        Ok(())
    }
}
