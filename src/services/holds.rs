use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};
use uuid::Uuid;

use super::projector::{project_seat_map, SeatMap};
use super::InventoryService;
use crate::cache::seats::SeatLookup;
use crate::error::{InventoryError, InventoryResult};
use crate::models::Cart;
use crate::store::HoldRequest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoldResult {
    pub held_until: DateTime<Utc>,
    pub held_seat_ids: Vec<String>,
}

/// Trims, drops blanks and de-duplicates. The result is sorted.
fn normalize_seat_ids(seat_ids: &[String]) -> Vec<String> {
    seat_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl InventoryService {
    /// Opens a cart for a session. The cart lives `cart_ttl_minutes` until its
    /// first hold, after which it shares the expiry of its holds.
    pub async fn open_cart(&self, session_id: Uuid, user_id: Option<Uuid>) -> InventoryResult<Cart> {
        let now = self.clock.now();
        let expires_at = now + Duration::minutes(i64::from(self.holds.cart_ttl_minutes));
        let cart = self
            .store
            .create_cart(session_id, user_id, expires_at, now)
            .await?;
        debug!("Opened cart {} for session {}", cart.id, session_id);
        Ok(cart)
    }

    /// Holds every requested seat for the cart, or none of them.
    ///
    /// Seats already held by the same cart are re-held with the new expiry.
    /// Any seat that is sold, held by another cart, a gap, or unknown makes the
    /// whole request fail with [`InventoryError::SeatOccupied`].
    pub async fn hold_seats(
        &self,
        cart_id: Uuid,
        seat_ids: &[String],
        ttl_minutes: Option<u32>,
    ) -> InventoryResult<HoldResult> {
        let seat_ids = normalize_seat_ids(seat_ids);
        if seat_ids.is_empty() {
            return Err(InventoryError::InvalidRequest("no seats requested".to_string()));
        }
        if seat_ids.len() > self.holds.max_seats_per_hold {
            return Err(InventoryError::InvalidRequest(format!(
                "at most {} seats per hold",
                self.holds.max_seats_per_hold
            )));
        }

        let ttl = ttl_minutes.unwrap_or(self.holds.default_ttl_minutes);
        if ttl == 0 || ttl > self.holds.max_ttl_minutes {
            return Err(InventoryError::InvalidRequest(format!(
                "hold ttl must be between 1 and {} minutes",
                self.holds.max_ttl_minutes
            )));
        }

        let now = self.clock.now();
        let request = HoldRequest {
            cart_id,
            seat_ids,
            held_until: now + Duration::minutes(i64::from(ttl)),
            now,
        };

        let outcome = self.store.hold_seats(&request).await.inspect_err(|e| {
            if let InventoryError::SeatOccupied { seat_ids } = e {
                info!("Cart {} lost seats {:?}", cart_id, seat_ids);
            }
        })?;

        info!(
            "Cart {} holds {} seats until {}",
            cart_id,
            outcome.held_seat_ids.len(),
            outcome.held_until
        );
        self.invalidate_session(outcome.session_id).await;

        Ok(HoldResult {
            held_until: outcome.held_until,
            held_seat_ids: outcome.held_seat_ids,
        })
    }

    /// Drops holds the cart owns. An empty list drops all of them and
    /// cancels the cart, so it can take no further holds.
    pub async fn release_seats(&self, cart_id: Uuid, seat_ids: &[String]) -> InventoryResult<Vec<String>> {
        let requested = seat_ids.len();
        let seat_ids = normalize_seat_ids(seat_ids);
        if requested > 0 && seat_ids.is_empty() {
            return Err(InventoryError::InvalidRequest("seat ids are blank".to_string()));
        }
        let change = self.store.release_cart_seats(cart_id, &seat_ids).await?;
        if seat_ids.is_empty() {
            info!("Cart {} released all holds, cancelled if still active", cart_id);
        }

        if !change.seat_ids.is_empty() {
            info!("Cart {} released {} seats", cart_id, change.seat_ids.len());
            self.invalidate_session(change.session_id).await;
        }
        Ok(change.seat_ids)
    }

    /// Turns the cart's live holds into sales. Called by checkout once payment
    /// has cleared.
    pub async fn sell_held_seats(&self, cart_id: Uuid) -> InventoryResult<Vec<String>> {
        let now = self.clock.now();
        let change = self.store.sell_held_seats(cart_id, now).await?;

        info!("Cart {} purchased {} seats", cart_id, change.seat_ids.len());
        self.invalidate_session(change.session_id).await;
        Ok(change.seat_ids)
    }

    /// Seat map as a buyer sees it right now. Generates the seat set on first
    /// request.
    pub async fn seat_map(&self, session_id: Uuid, viewer: Option<Uuid>) -> InventoryResult<SeatMap> {
        let mut cache_version = None;
        if let Some(cache) = &self.cache {
            match cache.get_seats(session_id).await {
                SeatLookup::Hit(seats) => {
                    return Ok(project_seat_map(session_id, &seats, self.clock.now(), viewer));
                }
                SeatLookup::Miss { version } => cache_version = Some(version),
                SeatLookup::Unavailable => {}
            }
        }

        self.ensure_seats_for_session(session_id).await?;
        let seats = self.store.list_seats(session_id).await?;
        if let (Some(cache), Some(version)) = (&self.cache, cache_version) {
            cache.put_seats(session_id, version, &seats).await;
        }
        Ok(project_seat_map(session_id, &seats, self.clock.now(), viewer))
    }
}
