use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

use super::InventoryService;
use crate::error::{InventoryError, InventoryResult};
use crate::models::{seat::display_seat_id, AuditoriumLayout, NewSeat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnsureOutcome {
    pub created: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerateOutcome {
    pub created: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegenerateOutcome {
    pub deleted: u64,
    pub created: u64,
}

/// Expands a layout into every seat coordinate of a session, in layout order.
pub fn expand_layout(session_id: Uuid, layout: &AuditoriumLayout) -> Vec<NewSeat> {
    let mut seats = Vec::with_capacity(layout.total_seats());
    for row in &layout.rows {
        let label = row.label.trim();
        // validate() rejects rows past i32::MAX
        let seat_count = i32::try_from(row.seat_count).unwrap_or(i32::MAX);
        for number in 1..=seat_count {
            seats.push(NewSeat {
                session_id,
                row_label: label.to_string(),
                number,
                seat_id: display_seat_id(label, number),
                seat_type: row.seat_type(number.unsigned_abs()),
            });
        }
    }
    seats
}

impl InventoryService {
    async fn session_layout(&self, session_id: Uuid) -> InventoryResult<AuditoriumLayout> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or(InventoryError::SessionNotFound(session_id))?;

        let layout = self
            .store
            .find_layout(session.auditorium_id)
            .await?
            .filter(|layout| !layout.rows.is_empty())
            .ok_or(InventoryError::LayoutMissing(session_id))?;

        layout.validate()?;
        Ok(layout)
    }

    /// Creates whatever seats of the layout are missing. Safe to call any
    /// number of times, concurrently: seats that appear between our read and
    /// our insert are counted as skipped.
    pub async fn ensure_seats_for_session(&self, session_id: Uuid) -> InventoryResult<EnsureOutcome> {
        let layout = self.session_layout(session_id).await?;
        let expected = expand_layout(session_id, &layout);

        let existing: HashSet<(String, i32)> = self
            .store
            .list_seats(session_id)
            .await?
            .into_iter()
            .map(|seat| (seat.row_label, seat.number))
            .collect();

        let missing: Vec<NewSeat> = expected
            .iter()
            .filter(|seat| !existing.contains(&(seat.row_label.clone(), seat.number)))
            .cloned()
            .collect();

        let created = if missing.is_empty() {
            0
        } else {
            self.store.insert_missing_seats(&missing).await?
        };
        let skipped = expected.len() as u64 - created;

        if created > 0 {
            info!("Session {}: created {} seats, {} already present", session_id, created, skipped);
            self.invalidate_session(session_id).await;
        }
        Ok(EnsureOutcome { created, skipped })
    }

    /// Plain insert of the whole layout, for sessions that were just created.
    /// Fails if any seat of the session already exists.
    pub async fn generate_seats_for_session(&self, session_id: Uuid) -> InventoryResult<GenerateOutcome> {
        let layout = self.session_layout(session_id).await?;
        let seats = expand_layout(session_id, &layout);
        let created = self.store.insert_seats(&seats).await?;

        info!("Session {}: generated {} seats", session_id, created);
        self.invalidate_session(session_id).await;
        Ok(GenerateOutcome { created })
    }

    /// Drops and rebuilds the seat set. Refused once anything was sold.
    pub async fn regenerate_seats_for_session(&self, session_id: Uuid) -> InventoryResult<RegenerateOutcome> {
        let layout = self.session_layout(session_id).await?;
        let seats = expand_layout(session_id, &layout);

        let outcome = self
            .store
            .replace_unsold_seats(session_id, &seats)
            .await
            .inspect_err(|e| {
                if matches!(e, InventoryError::SeatsAlreadySold(_)) {
                    warn!("Refusing to regenerate seats of session {}: sales exist", session_id);
                }
            })?;

        info!(
            "Session {}: regenerated seats ({} deleted, {} created)",
            session_id, outcome.deleted, outcome.created
        );
        self.invalidate_session(session_id).await;
        Ok(RegenerateOutcome {
            deleted: outcome.deleted,
            created: outcome.created,
        })
    }
}
