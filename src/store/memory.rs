use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::{
    HoldOutcome, HoldRequest, InventoryStore, ReclaimOutcome, ReleasedSeat, ReplaceOutcome,
    SeatChange,
};
use crate::error::{InventoryError, InventoryResult};
use crate::models::{
    AuditoriumLayout, Cart, CartStatus, NewSeat, QueueEntry, QueueStatus, Seat, SeatStatus,
    SessionRecord,
};

#[derive(Debug, Default)]
struct Tables {
    auditoriums: HashMap<Uuid, AuditoriumLayout>,
    sessions: HashMap<Uuid, SessionRecord>,
    /// (session_id, seat_id) -> seat. The key doubles as the uniqueness constraint.
    seats: BTreeMap<(Uuid, String), Seat>,
    carts: HashMap<Uuid, Cart>,
    tickets: Vec<(Uuid, String, Uuid)>,
    queue_counters: HashMap<String, i64>,
    queue_entries: HashMap<Uuid, QueueEntry>,
}

impl Tables {
    fn coordinate_taken(&self, seat: &NewSeat) -> bool {
        self.seats.contains_key(&(seat.session_id, seat.seat_id.clone()))
            || self.seats.values().any(|s| {
                s.session_id == seat.session_id
                    && s.row_label == seat.row_label
                    && s.number == seat.number
            })
    }

    fn open_cart(&self, cart_id: Uuid, now: DateTime<Utc>) -> InventoryResult<&Cart> {
        let cart = self
            .carts
            .get(&cart_id)
            .ok_or(InventoryError::CartNotFound(cart_id))?;
        if !cart.is_open(now) {
            return Err(InventoryError::CartNotActive(cart_id));
        }
        Ok(cart)
    }
}

/// Same guard the SQL `UPDATE ... WHERE` applies when taking a hold.
fn holdable_by(seat: &Seat, cart_id: Uuid, now: DateTime<Utc>) -> bool {
    let unsold = seat.sold_cart_id.is_none()
        && seat.sold_at.is_none()
        && seat.status != SeatStatus::Sold;
    let free_or_ours = match seat.held_by_cart_id {
        None => true,
        Some(owner) if owner == cart_id => true,
        Some(_) => seat.held_until.map_or(true, |until| until <= now),
    };
    unsold && seat.seat_type.is_bookable() && free_or_ours
}

fn clear_hold(seat: &mut Seat) {
    seat.status = SeatStatus::Available;
    seat.held_until = None;
    seat.held_by_cart_id = None;
}

/// In-process model of the inventory tables.
///
/// One mutex stands in for the database's serialization point, so every
/// trait method observes and mutates the tables atomically, exactly like a
/// single SQL statement or transaction would.
#[derive(Debug, Clone, Default)]
pub struct MemoryInventoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_auditorium(&self, layout: AuditoriumLayout) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().auditoriums.insert(id, layout);
        id
    }

    pub fn insert_session(&self, auditorium_id: Uuid, starts_at: DateTime<Utc>) -> SessionRecord {
        let session = SessionRecord {
            id: Uuid::new_v4(),
            auditorium_id,
            starts_at,
        };
        self.lock().sessions.insert(session.id, session.clone());
        session
    }

    pub fn insert_ticket(&self, session_id: Uuid, seat_id: &str, cart_id: Uuid) {
        self.lock()
            .tickets
            .push((session_id, seat_id.to_string(), cart_id));
    }

    pub fn seat(&self, session_id: Uuid, seat_id: &str) -> Option<Seat> {
        self.lock()
            .seats
            .get(&(session_id, seat_id.to_string()))
            .cloned()
    }

    /// Overwrites a stored seat, for setting up stale or inconsistent rows.
    pub fn put_seat(&self, seat: Seat) {
        self.lock()
            .seats
            .insert((seat.session_id, seat.seat_id.clone()), seat);
    }
}

#[async_trait]
impl InventoryStore for MemoryInventoryStore {
    async fn find_session(&self, session_id: Uuid) -> InventoryResult<Option<SessionRecord>> {
        Ok(self.lock().sessions.get(&session_id).cloned())
    }

    async fn find_layout(&self, auditorium_id: Uuid) -> InventoryResult<Option<AuditoriumLayout>> {
        Ok(self.lock().auditoriums.get(&auditorium_id).cloned())
    }

    async fn find_cart(&self, cart_id: Uuid) -> InventoryResult<Option<Cart>> {
        Ok(self.lock().carts.get(&cart_id).cloned())
    }

    async fn create_cart(
        &self,
        session_id: Uuid,
        user_id: Option<Uuid>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> InventoryResult<Cart> {
        let mut tables = self.lock();
        if !tables.sessions.contains_key(&session_id) {
            return Err(InventoryError::SessionNotFound(session_id));
        }
        let cart = Cart {
            id: Uuid::new_v4(),
            session_id,
            user_id,
            status: CartStatus::Active,
            expires_at,
            created_at: now,
        };
        tables.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn list_seats(&self, session_id: Uuid) -> InventoryResult<Vec<Seat>> {
        Ok(self
            .lock()
            .seats
            .values()
            .filter(|s| s.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn insert_missing_seats(&self, seats: &[NewSeat]) -> InventoryResult<u64> {
        let mut tables = self.lock();
        let mut created = 0;
        for seat in seats {
            if tables.coordinate_taken(seat) {
                continue;
            }
            let seat = seat.clone().into_seat();
            tables.seats.insert((seat.session_id, seat.seat_id.clone()), seat);
            created += 1;
        }
        Ok(created)
    }

    async fn insert_seats(&self, seats: &[NewSeat]) -> InventoryResult<u64> {
        let mut tables = self.lock();
        let mut batch = HashSet::with_capacity(seats.len());
        for seat in seats {
            if tables.coordinate_taken(seat) || !batch.insert((seat.session_id, seat.seat_id.clone())) {
                return Err(InventoryError::Database(sqlx::Error::Protocol(format!(
                    "duplicate key value violates unique constraint: seat {} of session {}",
                    seat.seat_id, seat.session_id
                ))));
            }
        }
        for seat in seats {
            let seat = seat.clone().into_seat();
            tables.seats.insert((seat.session_id, seat.seat_id.clone()), seat);
        }
        Ok(seats.len() as u64)
    }

    async fn replace_unsold_seats(
        &self,
        session_id: Uuid,
        seats: &[NewSeat],
    ) -> InventoryResult<ReplaceOutcome> {
        let mut tables = self.lock();
        if !tables.sessions.contains_key(&session_id) {
            return Err(InventoryError::SessionNotFound(session_id));
        }
        let has_tickets = tables.tickets.iter().any(|(s, _, _)| *s == session_id);
        let has_sold = tables.seats.values().any(|s| {
            s.session_id == session_id
                && (s.sold_cart_id.is_some() || s.sold_at.is_some() || s.status == SeatStatus::Sold)
        });
        if has_tickets || has_sold {
            return Err(InventoryError::SeatsAlreadySold(session_id));
        }

        let before = tables.seats.len();
        tables.seats.retain(|(sid, _), _| *sid != session_id);
        let deleted = (before - tables.seats.len()) as u64;
        for seat in seats {
            let seat = seat.clone().into_seat();
            tables.seats.insert((seat.session_id, seat.seat_id.clone()), seat);
        }
        Ok(ReplaceOutcome {
            deleted,
            created: seats.len() as u64,
        })
    }

    async fn hold_seats(&self, request: &HoldRequest) -> InventoryResult<HoldOutcome> {
        let mut tables = self.lock();
        let session_id = tables.open_cart(request.cart_id, request.now)?.session_id;

        let lost: Vec<String> = request
            .seat_ids
            .iter()
            .filter(|seat_id| {
                tables
                    .seats
                    .get(&(session_id, (*seat_id).clone()))
                    .map_or(true, |seat| !holdable_by(seat, request.cart_id, request.now))
            })
            .cloned()
            .collect();
        if !lost.is_empty() {
            return Err(InventoryError::SeatOccupied { seat_ids: lost });
        }

        // One expiry for everything the cart holds.
        for seat in tables.seats.values_mut() {
            if seat.held_by_cart_id == Some(request.cart_id)
                && seat.status == SeatStatus::Held
                && seat.held_until.is_some_and(|until| until > request.now)
            {
                seat.held_until = Some(request.held_until);
            }
        }
        for seat_id in &request.seat_ids {
            if let Some(seat) = tables.seats.get_mut(&(session_id, seat_id.clone())) {
                seat.status = SeatStatus::Held;
                seat.held_until = Some(request.held_until);
                seat.held_by_cart_id = Some(request.cart_id);
            }
        }
        if let Some(cart) = tables.carts.get_mut(&request.cart_id) {
            cart.expires_at = request.held_until;
        }

        Ok(HoldOutcome {
            session_id,
            held_until: request.held_until,
            held_seat_ids: request.seat_ids.clone(),
        })
    }

    async fn release_cart_seats(&self, cart_id: Uuid, seat_ids: &[String]) -> InventoryResult<SeatChange> {
        let mut tables = self.lock();
        let session_id = tables
            .carts
            .get(&cart_id)
            .ok_or(InventoryError::CartNotFound(cart_id))?
            .session_id;

        let mut released = Vec::new();
        for seat in tables.seats.values_mut() {
            let selected = seat_ids.is_empty() || seat_ids.contains(&seat.seat_id);
            if selected
                && seat.held_by_cart_id == Some(cart_id)
                && seat.status == SeatStatus::Held
                && seat.sold_cart_id.is_none()
            {
                clear_hold(seat);
                released.push(seat.seat_id.clone());
            }
        }
        if seat_ids.is_empty() {
            if let Some(cart) = tables.carts.get_mut(&cart_id) {
                if cart.status == CartStatus::Active {
                    cart.status = CartStatus::Cancelled;
                }
            }
        }
        Ok(SeatChange {
            session_id,
            seat_ids: released,
        })
    }

    async fn sell_held_seats(&self, cart_id: Uuid, now: DateTime<Utc>) -> InventoryResult<SeatChange> {
        let mut tables = self.lock();
        let session_id = tables.open_cart(cart_id, now)?.session_id;

        let mut sold = Vec::new();
        for seat in tables.seats.values_mut() {
            if seat.held_by_cart_id == Some(cart_id)
                && seat.status == SeatStatus::Held
                && seat.held_until.is_some_and(|until| until > now)
                && seat.sold_cart_id.is_none()
            {
                seat.status = SeatStatus::Sold;
                seat.sold_at = Some(now);
                seat.sold_cart_id = Some(cart_id);
                seat.held_until = None;
                seat.held_by_cart_id = None;
                sold.push(seat.seat_id.clone());
            }
        }
        if sold.is_empty() {
            return Err(InventoryError::InvalidRequest(format!(
                "cart {} has no unexpired holds",
                cart_id
            )));
        }
        for seat_id in &sold {
            tables.tickets.push((session_id, seat_id.clone(), cart_id));
        }
        if let Some(cart) = tables.carts.get_mut(&cart_id) {
            cart.status = CartStatus::Completed;
        }
        Ok(SeatChange {
            session_id,
            seat_ids: sold,
        })
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> InventoryResult<ReclaimOutcome> {
        let mut tables = self.lock();
        let mut outcome = ReclaimOutcome::default();

        for seat in tables.seats.values_mut() {
            let lapsed = seat.held_until.map_or(true, |until| until <= now) || seat.held_by_cart_id.is_none();
            if seat.status == SeatStatus::Held
                && lapsed
                && seat.sold_cart_id.is_none()
                && seat.sold_at.is_none()
            {
                clear_hold(seat);
                outcome.released.push(ReleasedSeat {
                    session_id: seat.session_id,
                    seat_id: seat.seat_id.clone(),
                });
            }
        }
        for cart in tables.carts.values_mut() {
            if cart.status == CartStatus::Active && cart.expires_at <= now {
                cart.status = CartStatus::Expired;
                outcome.expired_carts += 1;
            }
        }
        Ok(outcome)
    }

    async fn allocate_queue_number(
        &self,
        scope_key: &str,
        user_id: Option<Uuid>,
        cart_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> InventoryResult<QueueEntry> {
        let mut tables = self.lock();
        let counter = tables.queue_counters.entry(scope_key.to_string()).or_insert(0);
        *counter += 1;
        let entry = QueueEntry {
            id: Uuid::new_v4(),
            scope_key: scope_key.to_string(),
            user_id,
            cart_id,
            queue_number: *counter,
            status: QueueStatus::Waiting,
            created_at: now,
            admitted_at: None,
        };
        tables.queue_entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn admit_waiting(
        &self,
        scope_key: &str,
        capacity: i64,
        now: DateTime<Utc>,
    ) -> InventoryResult<Vec<QueueEntry>> {
        let mut tables = self.lock();
        let admitted = tables
            .queue_entries
            .values()
            .filter(|e| e.scope_key == scope_key && e.status == QueueStatus::Admitted)
            .count() as i64;
        let free_slots = (capacity - admitted).max(0) as usize;

        let mut waiting: Vec<(i64, Uuid)> = tables
            .queue_entries
            .values()
            .filter(|e| e.scope_key == scope_key && e.status == QueueStatus::Waiting)
            .map(|e| (e.queue_number, e.id))
            .collect();
        waiting.sort_unstable();

        let mut result = Vec::new();
        for (_, id) in waiting.into_iter().take(free_slots) {
            if let Some(entry) = tables.queue_entries.get_mut(&id) {
                entry.status = QueueStatus::Admitted;
                entry.admitted_at = Some(now);
                result.push(entry.clone());
            }
        }
        Ok(result)
    }

    async fn complete_queue_entry(&self, entry_id: Uuid) -> InventoryResult<Option<QueueEntry>> {
        let mut tables = self.lock();
        let Some(entry) = tables.queue_entries.get_mut(&entry_id) else {
            return Ok(None);
        };
        if entry.status != QueueStatus::Admitted {
            return Err(InventoryError::InvalidRequest(format!(
                "queue entry {} is {}, only ADMITTED entries can complete",
                entry_id,
                entry.status.as_str()
            )));
        }
        entry.status = QueueStatus::Done;
        Ok(Some(entry.clone()))
    }

    async fn queue_position(&self, entry_id: Uuid) -> InventoryResult<Option<(QueueEntry, i64)>> {
        let tables = self.lock();
        Ok(tables.queue_entries.get(&entry_id).map(|entry| {
            let ahead = tables
                .queue_entries
                .values()
                .filter(|e| {
                    e.scope_key == entry.scope_key
                        && e.status == QueueStatus::Waiting
                        && e.queue_number < entry.queue_number
                })
                .count() as i64;
            (entry.clone(), ahead)
        }))
    }
}
