#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use seat_inventory::clock::ManualClock;
use seat_inventory::config::{HoldConfig, QueueConfig};
use seat_inventory::models::{AuditoriumLayout, RowLayout, SeatType};
use seat_inventory::services::InventoryService;
use seat_inventory::store::MemoryInventoryStore;

pub struct Harness {
    pub store: MemoryInventoryStore,
    pub clock: Arc<ManualClock>,
    pub service: InventoryService,
    pub session_id: Uuid,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 18, 0, 0).unwrap()
}

/// Row A: 10 standard seats. Row B: 8 seats, 1-2 wheelchair.
pub fn two_row_layout() -> AuditoriumLayout {
    AuditoriumLayout::new(vec![
        RowLayout::new("A", 10),
        RowLayout::new("B", 8).with_type([1, 2], SeatType::Wheelchair),
    ])
}

pub fn harness() -> Harness {
    harness_with(two_row_layout())
}

pub fn harness_with(layout: AuditoriumLayout) -> Harness {
    let store = MemoryInventoryStore::new();
    let auditorium_id = store.insert_auditorium(layout);
    let session = store.insert_session(auditorium_id, start_time() + chrono::Duration::days(1));
    let clock = Arc::new(ManualClock::new(start_time()));
    let service = InventoryService::new(
        Arc::new(store.clone()),
        None,
        clock.clone(),
        HoldConfig::default(),
        QueueConfig::default(),
    );
    Harness {
        store,
        clock,
        service,
        session_id: session.id,
    }
}

pub fn ids(seat_ids: &[&str]) -> Vec<String> {
    seat_ids.iter().map(|id| id.to_string()).collect()
}
