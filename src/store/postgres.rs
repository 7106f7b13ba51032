use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

use super::{
    HoldOutcome, HoldRequest, InventoryStore, ReclaimOutcome, ReleasedSeat, ReplaceOutcome,
    SeatChange,
};
use crate::database::Database;
use crate::error::{InventoryError, InventoryResult};
use crate::models::{
    AuditoriumLayout, Cart, CartStatus, NewSeat, QueueEntry, QueueStatus, Seat, SeatStatus,
    SeatType, SessionRecord,
};

const SEAT_COLUMNS: &str = "id, session_id, row_label, number, seat_id, seat_type, status, \
     held_until, held_by_cart_id, sold_at, sold_cart_id";

const QUEUE_COLUMNS: &str =
    "id, scope_key, user_id, cart_id, queue_number, status, created_at, admitted_at";

// Rows come back with TEXT status columns; they are mapped to enums here.

#[derive(FromRow)]
struct SeatRow {
    id: Uuid,
    session_id: Uuid,
    row_label: String,
    number: i32,
    seat_id: String,
    seat_type: String,
    status: String,
    held_until: Option<DateTime<Utc>>,
    held_by_cart_id: Option<Uuid>,
    sold_at: Option<DateTime<Utc>>,
    sold_cart_id: Option<Uuid>,
}

#[derive(FromRow)]
struct CartRow {
    id: Uuid,
    session_id: Uuid,
    user_id: Option<Uuid>,
    status: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct QueueRow {
    id: Uuid,
    scope_key: String,
    user_id: Option<Uuid>,
    cart_id: Option<Uuid>,
    queue_number: i64,
    status: String,
    created_at: DateTime<Utc>,
    admitted_at: Option<DateTime<Utc>>,
}

fn decode_error(what: &str, value: &str) -> InventoryError {
    InventoryError::Database(sqlx::Error::Decode(
        format!("unknown {} '{}'", what, value).into(),
    ))
}

impl TryFrom<SeatRow> for Seat {
    type Error = InventoryError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        Ok(Seat {
            seat_type: SeatType::parse(&row.seat_type)
                .ok_or_else(|| decode_error("seat type", &row.seat_type))?,
            status: SeatStatus::parse(&row.status)
                .ok_or_else(|| decode_error("seat status", &row.status))?,
            id: row.id,
            session_id: row.session_id,
            row_label: row.row_label,
            number: row.number,
            seat_id: row.seat_id,
            held_until: row.held_until,
            held_by_cart_id: row.held_by_cart_id,
            sold_at: row.sold_at,
            sold_cart_id: row.sold_cart_id,
        })
    }
}

impl TryFrom<CartRow> for Cart {
    type Error = InventoryError;

    fn try_from(row: CartRow) -> Result<Self, Self::Error> {
        Ok(Cart {
            status: CartStatus::parse(&row.status)
                .ok_or_else(|| decode_error("cart status", &row.status))?,
            id: row.id,
            session_id: row.session_id,
            user_id: row.user_id,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<QueueRow> for QueueEntry {
    type Error = InventoryError;

    fn try_from(row: QueueRow) -> Result<Self, Self::Error> {
        Ok(QueueEntry {
            status: QueueStatus::parse(&row.status)
                .ok_or_else(|| decode_error("queue status", &row.status))?,
            id: row.id,
            scope_key: row.scope_key,
            user_id: row.user_id,
            cart_id: row.cart_id,
            queue_number: row.queue_number,
            created_at: row.created_at,
            admitted_at: row.admitted_at,
        })
    }
}

/// Column-wise arrays for `UNNEST` batch inserts.
struct SeatColumns {
    ids: Vec<Uuid>,
    session_ids: Vec<Uuid>,
    row_labels: Vec<String>,
    numbers: Vec<i32>,
    seat_ids: Vec<String>,
    seat_types: Vec<String>,
}

impl SeatColumns {
    fn from_seats(seats: &[NewSeat]) -> Self {
        let mut columns = SeatColumns {
            ids: Vec::with_capacity(seats.len()),
            session_ids: Vec::with_capacity(seats.len()),
            row_labels: Vec::with_capacity(seats.len()),
            numbers: Vec::with_capacity(seats.len()),
            seat_ids: Vec::with_capacity(seats.len()),
            seat_types: Vec::with_capacity(seats.len()),
        };
        for seat in seats {
            columns.ids.push(Uuid::new_v4());
            columns.session_ids.push(seat.session_id);
            columns.row_labels.push(seat.row_label.clone());
            columns.numbers.push(seat.number);
            columns.seat_ids.push(seat.seat_id.clone());
            columns.seat_types.push(seat.seat_type.as_str().to_string());
        }
        columns
    }
}

fn insert_seats_sql(skip_conflicts: bool) -> String {
    format!(
        r#"
        INSERT INTO seats (id, session_id, row_label, number, seat_id, seat_type, status)
        SELECT t.id, t.session_id, t.row_label, t.number, t.seat_id, t.seat_type, 'AVAILABLE'
        FROM UNNEST($1::uuid[], $2::uuid[], $3::text[], $4::int4[], $5::text[], $6::text[])
            AS t(id, session_id, row_label, number, seat_id, seat_type)
        {}
        "#,
        if skip_conflicts { "ON CONFLICT DO NOTHING" } else { "" }
    )
}

async fn execute_seat_insert<'e, E>(executor: E, seats: &[NewSeat], skip_conflicts: bool) -> Result<u64, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    if seats.is_empty() {
        return Ok(0);
    }
    let columns = SeatColumns::from_seats(seats);
    let result = sqlx::query(&insert_seats_sql(skip_conflicts))
        .bind(&columns.ids)
        .bind(&columns.session_ids)
        .bind(&columns.row_labels)
        .bind(&columns.numbers)
        .bind(&columns.seat_ids)
        .bind(&columns.seat_types)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// PostgreSQL-backed inventory. Exclusivity comes from unique constraints,
/// conditional `UPDATE ... WHERE` predicates and `FOR UPDATE` row locks.
#[derive(Clone)]
pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool.clone(),
        }
    }

    /// Locks the cart row for the rest of the transaction and checks it can take holds.
    async fn lock_open_cart(
        tx: &mut sqlx::PgConnection,
        cart_id: Uuid,
        now: DateTime<Utc>,
    ) -> InventoryResult<Uuid> {
        let cart: Option<(Uuid, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT session_id, status, expires_at FROM carts WHERE id = $1 FOR UPDATE",
        )
        .bind(cart_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (session_id, status, expires_at) = cart.ok_or(InventoryError::CartNotFound(cart_id))?;
        if status != CartStatus::Active.as_str() || expires_at <= now {
            return Err(InventoryError::CartNotActive(cart_id));
        }
        Ok(session_id)
    }
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn find_session(&self, session_id: Uuid) -> InventoryResult<Option<SessionRecord>> {
        let session = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, auditorium_id, starts_at FROM sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn find_layout(&self, auditorium_id: Uuid) -> InventoryResult<Option<AuditoriumLayout>> {
        let layout: Option<Option<Json<AuditoriumLayout>>> =
            sqlx::query_scalar("SELECT layout FROM auditoriums WHERE id = $1")
                .bind(auditorium_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(layout.flatten().map(|Json(layout)| layout))
    }

    async fn find_cart(&self, cart_id: Uuid) -> InventoryResult<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT id, session_id, user_id, status, expires_at, created_at FROM carts WHERE id = $1",
        )
        .bind(cart_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Cart::try_from).transpose()
    }

    async fn create_cart(
        &self,
        session_id: Uuid,
        user_id: Option<Uuid>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> InventoryResult<Cart> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sessions WHERE id = $1)")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(InventoryError::SessionNotFound(session_id));
        }

        let row = sqlx::query_as::<_, CartRow>(
            r#"
            INSERT INTO carts (id, session_id, user_id, status, expires_at, created_at)
            VALUES ($1, $2, $3, 'ACTIVE', $4, $5)
            RETURNING id, session_id, user_id, status, expires_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(user_id)
        .bind(expires_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Cart::try_from(row)
    }

    async fn list_seats(&self, session_id: Uuid) -> InventoryResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(&format!(
            "SELECT {} FROM seats WHERE session_id = $1 ORDER BY row_label, number",
            SEAT_COLUMNS
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Seat::try_from).collect()
    }

    async fn insert_missing_seats(&self, seats: &[NewSeat]) -> InventoryResult<u64> {
        Ok(execute_seat_insert(&self.pool, seats, true).await?)
    }

    async fn insert_seats(&self, seats: &[NewSeat]) -> InventoryResult<u64> {
        Ok(execute_seat_insert(&self.pool, seats, false).await?)
    }

    async fn replace_unsold_seats(
        &self,
        session_id: Uuid,
        seats: &[NewSeat],
    ) -> InventoryResult<ReplaceOutcome> {
        let mut tx = self.pool.begin().await?;

        let session: Option<Uuid> = sqlx::query_scalar("SELECT id FROM sessions WHERE id = $1 FOR UPDATE")
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await?;
        if session.is_none() {
            return Err(InventoryError::SessionNotFound(session_id));
        }

        // Lock every seat first so a checkout cannot slip in between the check and the delete.
        sqlx::query("SELECT id FROM seats WHERE session_id = $1 ORDER BY id FOR UPDATE")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        let has_sales: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(SELECT 1 FROM tickets WHERE session_id = $1)
                OR EXISTS(
                    SELECT 1 FROM seats
                    WHERE session_id = $1
                      AND (sold_cart_id IS NOT NULL OR sold_at IS NOT NULL OR status = 'SOLD')
                )
            "#,
        )
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;
        if has_sales {
            tx.rollback().await?;
            return Err(InventoryError::SeatsAlreadySold(session_id));
        }

        let deleted = sqlx::query("DELETE FROM seats WHERE session_id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let created = execute_seat_insert(&mut *tx, seats, false).await?;

        tx.commit().await?;
        Ok(ReplaceOutcome { deleted, created })
    }

    async fn hold_seats(&self, request: &HoldRequest) -> InventoryResult<HoldOutcome> {
        let mut tx = self.pool.begin().await?;
        let session_id = Self::lock_open_cart(&mut *tx, request.cart_id, request.now).await?;

        // Rows are locked in id order so overlapping requests cannot deadlock;
        // the outer predicate is evaluated against the locked, current row.
        let won: Vec<String> = sqlx::query_scalar(
            r#"
            UPDATE seats AS s
            SET status = 'HELD', held_until = $4, held_by_cart_id = $3, updated_at = $5
            FROM (
                SELECT id FROM seats
                WHERE session_id = $1 AND seat_id = ANY($2)
                ORDER BY id
                FOR UPDATE
            ) AS locked
            WHERE s.id = locked.id
              AND s.seat_type <> 'GAP'
              AND s.status <> 'SOLD'
              AND s.sold_cart_id IS NULL
              AND s.sold_at IS NULL
              AND (s.held_by_cart_id IS NULL
                   OR s.held_by_cart_id = $3
                   OR s.held_until IS NULL
                   OR s.held_until <= $5)
            RETURNING s.seat_id
            "#,
        )
        .bind(session_id)
        .bind(&request.seat_ids)
        .bind(request.cart_id)
        .bind(request.held_until)
        .bind(request.now)
        .fetch_all(&mut *tx)
        .await?;

        if won.len() != request.seat_ids.len() {
            tx.rollback().await?;
            let lost = request
                .seat_ids
                .iter()
                .filter(|id| !won.contains(id))
                .cloned()
                .collect();
            return Err(InventoryError::SeatOccupied { seat_ids: lost });
        }

        // One expiry for the whole cart: its earlier holds move with the new one.
        sqlx::query(
            r#"
            UPDATE seats SET held_until = $2, updated_at = $3
            WHERE held_by_cart_id = $1 AND status = 'HELD' AND held_until > $3
            "#,
        )
        .bind(request.cart_id)
        .bind(request.held_until)
        .bind(request.now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE carts SET expires_at = $2 WHERE id = $1")
            .bind(request.cart_id)
            .bind(request.held_until)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(HoldOutcome {
            session_id,
            held_until: request.held_until,
            held_seat_ids: request.seat_ids.clone(),
        })
    }

    async fn release_cart_seats(&self, cart_id: Uuid, seat_ids: &[String]) -> InventoryResult<SeatChange> {
        let mut tx = self.pool.begin().await?;
        let session_id: Option<Uuid> = sqlx::query_scalar("SELECT session_id FROM carts WHERE id = $1 FOR UPDATE")
            .bind(cart_id)
            .fetch_optional(&mut *tx)
            .await?;
        let session_id = session_id.ok_or(InventoryError::CartNotFound(cart_id))?;

        let released: Vec<String> = sqlx::query_scalar(
            r#"
            UPDATE seats
            SET status = 'AVAILABLE', held_until = NULL, held_by_cart_id = NULL, updated_at = NOW()
            WHERE held_by_cart_id = $1
              AND status = 'HELD'
              AND sold_cart_id IS NULL
              AND (cardinality($2::text[]) = 0 OR seat_id = ANY($2))
            RETURNING seat_id
            "#,
        )
        .bind(cart_id)
        .bind(seat_ids)
        .fetch_all(&mut *tx)
        .await?;

        if seat_ids.is_empty() {
            sqlx::query("UPDATE carts SET status = 'CANCELLED' WHERE id = $1 AND status = 'ACTIVE'")
                .bind(cart_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(SeatChange {
            session_id,
            seat_ids: released,
        })
    }

    async fn sell_held_seats(&self, cart_id: Uuid, now: DateTime<Utc>) -> InventoryResult<SeatChange> {
        let mut tx = self.pool.begin().await?;
        let session_id = Self::lock_open_cart(&mut *tx, cart_id, now).await?;

        let sold: Vec<String> = sqlx::query_scalar(
            r#"
            UPDATE seats
            SET status = 'SOLD', sold_at = $2, sold_cart_id = $1,
                held_until = NULL, held_by_cart_id = NULL, updated_at = $2
            WHERE held_by_cart_id = $1
              AND status = 'HELD'
              AND held_until > $2
              AND sold_cart_id IS NULL
            RETURNING seat_id
            "#,
        )
        .bind(cart_id)
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        if sold.is_empty() {
            tx.rollback().await?;
            return Err(InventoryError::InvalidRequest(format!(
                "cart {} has no unexpired holds",
                cart_id
            )));
        }

        let ticket_ids: Vec<Uuid> = sold.iter().map(|_| Uuid::new_v4()).collect();
        sqlx::query(
            r#"
            INSERT INTO tickets (id, session_id, seat_id, cart_id, issued_at)
            SELECT t.id, $3, t.seat_id, $4, $5
            FROM UNNEST($1::uuid[], $2::text[]) AS t(id, seat_id)
            "#,
        )
        .bind(&ticket_ids)
        .bind(&sold)
        .bind(session_id)
        .bind(cart_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE carts SET status = 'COMPLETED' WHERE id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(SeatChange {
            session_id,
            seat_ids: sold,
        })
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> InventoryResult<ReclaimOutcome> {
        let mut tx = self.pool.begin().await?;

        // Expiry is re-checked by the UPDATE itself: a hold extended by its
        // owner after we started no longer matches and stays in place.
        let released: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            UPDATE seats
            SET status = 'AVAILABLE', held_until = NULL, held_by_cart_id = NULL, updated_at = $1
            WHERE status = 'HELD'
              AND (held_until IS NULL OR held_until <= $1 OR held_by_cart_id IS NULL)
              AND sold_cart_id IS NULL
              AND sold_at IS NULL
            RETURNING session_id, seat_id
            "#,
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        let expired_carts = sqlx::query(
            "UPDATE carts SET status = 'EXPIRED' WHERE status = 'ACTIVE' AND expires_at <= $1",
        )
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        Ok(ReclaimOutcome {
            released: released
                .into_iter()
                .map(|(session_id, seat_id)| ReleasedSeat { session_id, seat_id })
                .collect(),
            expired_carts,
        })
    }

    async fn allocate_queue_number(
        &self,
        scope_key: &str,
        user_id: Option<Uuid>,
        cart_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> InventoryResult<QueueEntry> {
        let mut tx = self.pool.begin().await?;

        // The counter row stays locked until commit, so numbers are handed out
        // in order and a failed insert rolls the increment back (no gaps).
        let number: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO queue_counters (scope_key, last_number)
            VALUES ($1, 1)
            ON CONFLICT (scope_key)
            DO UPDATE SET last_number = queue_counters.last_number + 1
            RETURNING last_number
            "#,
        )
        .bind(scope_key)
        .fetch_one(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, QueueRow>(&format!(
            r#"
            INSERT INTO queue_entries (id, scope_key, user_id, cart_id, queue_number, status, created_at)
            VALUES ($1, $2, $3, $4, $5, 'WAITING', $6)
            RETURNING {}
            "#,
            QUEUE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(scope_key)
        .bind(user_id)
        .bind(cart_id)
        .bind(number)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        QueueEntry::try_from(row)
    }

    async fn admit_waiting(
        &self,
        scope_key: &str,
        capacity: i64,
        now: DateTime<Utc>,
    ) -> InventoryResult<Vec<QueueEntry>> {
        let mut tx = self.pool.begin().await?;

        // Serializes admission per scope with allocation.
        let counter: Option<i64> =
            sqlx::query_scalar("SELECT last_number FROM queue_counters WHERE scope_key = $1 FOR UPDATE")
                .bind(scope_key)
                .fetch_optional(&mut *tx)
                .await?;
        if counter.is_none() {
            tx.rollback().await?;
            return Ok(Vec::new());
        }

        let admitted: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM queue_entries WHERE scope_key = $1 AND status = 'ADMITTED'",
        )
        .bind(scope_key)
        .fetch_one(&mut *tx)
        .await?;

        let free_slots = (capacity - admitted).max(0);
        if free_slots == 0 {
            tx.rollback().await?;
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, QueueRow>(&format!(
            r#"
            UPDATE queue_entries SET status = 'ADMITTED', admitted_at = $3
            WHERE id IN (
                SELECT id FROM queue_entries
                WHERE scope_key = $1 AND status = 'WAITING'
                ORDER BY queue_number
                LIMIT $2
            )
            RETURNING {}
            "#,
            QUEUE_COLUMNS
        ))
        .bind(scope_key)
        .bind(free_slots)
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut entries = rows
            .into_iter()
            .map(QueueEntry::try_from)
            .collect::<InventoryResult<Vec<_>>>()?;
        entries.sort_by_key(|e| e.queue_number);
        Ok(entries)
    }

    async fn complete_queue_entry(&self, entry_id: Uuid) -> InventoryResult<Option<QueueEntry>> {
        let row = sqlx::query_as::<_, QueueRow>(&format!(
            "UPDATE queue_entries SET status = 'DONE' WHERE id = $1 AND status = 'ADMITTED' RETURNING {}",
            QUEUE_COLUMNS
        ))
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = row {
            return QueueEntry::try_from(row).map(Some);
        }

        let status: Option<String> = sqlx::query_scalar("SELECT status FROM queue_entries WHERE id = $1")
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?;
        match status {
            None => Ok(None),
            Some(status) => Err(InventoryError::InvalidRequest(format!(
                "queue entry {} is {}, only ADMITTED entries can complete",
                entry_id, status
            ))),
        }
    }

    async fn queue_position(&self, entry_id: Uuid) -> InventoryResult<Option<(QueueEntry, i64)>> {
        let row = sqlx::query_as::<_, QueueRow>(&format!(
            "SELECT {} FROM queue_entries WHERE id = $1",
            QUEUE_COLUMNS
        ))
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let entry = QueueEntry::try_from(row)?;

        let ahead: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM queue_entries
            WHERE scope_key = $1 AND status = 'WAITING' AND queue_number < $2
            "#,
        )
        .bind(&entry.scope_key)
        .bind(entry.queue_number)
        .fetch_one(&self.pool)
        .await?;

        Ok(Some((entry, ahead)))
    }
}
