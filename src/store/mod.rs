//! Storage seam for the seat inventory.
//!
//! Every method here is one atomic unit against the shared store. The
//! "exactly one winner" guarantees (one holder per seat, one owner per queue
//! number, no duplicate seats) live inside these methods, never in the
//! callers: handlers may run in several processes that share nothing but the
//! database.
//!
//! Two implementations:
//! - [`PgInventoryStore`]: PostgreSQL, conditional updates and row locks.
//! - [`MemoryInventoryStore`]: a single-lock table model of the same
//!   primitives, used by tests and local runs without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::InventoryResult;
use crate::models::{AuditoriumLayout, Cart, NewSeat, QueueEntry, Seat, SessionRecord};

pub mod memory;
pub mod postgres;

pub use memory::MemoryInventoryStore;
pub use postgres::PgInventoryStore;

/// All-or-nothing hold request for one cart.
#[derive(Debug, Clone)]
pub struct HoldRequest {
    pub cart_id: Uuid,
    /// Distinct display ids (`A1`, `B7`, ...).
    pub seat_ids: Vec<String>,
    pub held_until: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldOutcome {
    pub session_id: Uuid,
    pub held_until: DateTime<Utc>,
    pub held_seat_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatChange {
    pub session_id: Uuid,
    pub seat_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ReleasedSeat {
    pub session_id: Uuid,
    pub seat_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimOutcome {
    pub released: Vec<ReleasedSeat>,
    pub expired_carts: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub deleted: u64,
    pub created: u64,
}

#[async_trait]
pub trait InventoryStore: Send + Sync + 'static {
    // --- collaborator lookups ---

    async fn find_session(&self, session_id: Uuid) -> InventoryResult<Option<SessionRecord>>;

    async fn find_layout(&self, auditorium_id: Uuid) -> InventoryResult<Option<AuditoriumLayout>>;

    async fn find_cart(&self, cart_id: Uuid) -> InventoryResult<Option<Cart>>;

    async fn create_cart(
        &self,
        session_id: Uuid,
        user_id: Option<Uuid>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> InventoryResult<Cart>;

    // --- seats ---

    async fn list_seats(&self, session_id: Uuid) -> InventoryResult<Vec<Seat>>;

    /// Inserts seats, silently skipping coordinates that already exist.
    /// Returns how many rows were actually created.
    async fn insert_missing_seats(&self, seats: &[NewSeat]) -> InventoryResult<u64>;

    /// Inserts seats; any duplicate coordinate fails the whole batch.
    async fn insert_seats(&self, seats: &[NewSeat]) -> InventoryResult<u64>;

    /// Deletes all seats of the session and inserts `seats`, but only when
    /// the session has no tickets and no sold seats.
    async fn replace_unsold_seats(
        &self,
        session_id: Uuid,
        seats: &[NewSeat],
    ) -> InventoryResult<ReplaceOutcome>;

    // --- holds ---

    async fn hold_seats(&self, request: &HoldRequest) -> InventoryResult<HoldOutcome>;

    /// Clears holds owned by the cart. An empty `seat_ids` releases all of
    /// them and cancels the cart if it is still `ACTIVE`.
    async fn release_cart_seats(&self, cart_id: Uuid, seat_ids: &[String]) -> InventoryResult<SeatChange>;

    /// Promotes the cart's unexpired holds to sales and closes the cart.
    async fn sell_held_seats(&self, cart_id: Uuid, now: DateTime<Utc>) -> InventoryResult<SeatChange>;

    async fn release_expired(&self, now: DateTime<Utc>) -> InventoryResult<ReclaimOutcome>;

    // --- queue ---

    async fn allocate_queue_number(
        &self,
        scope_key: &str,
        user_id: Option<Uuid>,
        cart_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> InventoryResult<QueueEntry>;

    async fn admit_waiting(
        &self,
        scope_key: &str,
        capacity: i64,
        now: DateTime<Utc>,
    ) -> InventoryResult<Vec<QueueEntry>>;

    /// Marks an `ADMITTED` entry `DONE`. `None` if the entry does not exist,
    /// `InvalidRequest` if it is in any other state.
    async fn complete_queue_entry(&self, entry_id: Uuid) -> InventoryResult<Option<QueueEntry>>;

    /// The entry and how many `WAITING` entries of its scope are ahead of it.
    async fn queue_position(&self, entry_id: Uuid) -> InventoryResult<Option<(QueueEntry, i64)>>;
}
