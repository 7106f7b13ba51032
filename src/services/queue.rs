use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::InventoryService;
use crate::error::{InventoryError, InventoryResult};
use crate::models::{QueueEntry, QueueStatus};

/// Scope key of the purchase queue for one session.
pub fn session_scope(session_id: Uuid) -> String {
    format!("session:{}", session_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueTicket {
    pub entry_id: Uuid,
    pub queue_number: i64,
    pub status: QueueStatus,
}

impl From<QueueEntry> for QueueTicket {
    fn from(entry: QueueEntry) -> Self {
        Self {
            entry_id: entry.id,
            queue_number: entry.queue_number,
            status: entry.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuePosition {
    pub entry: QueueEntry,
    /// Waiting entries of the same scope with a lower number.
    pub ahead: i64,
}

fn checked_scope(scope_key: &str) -> InventoryResult<&str> {
    let scope = scope_key.trim();
    if scope.is_empty() {
        return Err(InventoryError::InvalidRequest("queue scope must not be empty".to_string()));
    }
    Ok(scope)
}

impl InventoryService {
    /// Hands out the next number of the scope. Numbers start at 1 and never
    /// repeat or skip, however many callers race.
    pub async fn allocate_queue_number(
        &self,
        scope_key: &str,
        user_id: Option<Uuid>,
        cart_id: Option<Uuid>,
    ) -> InventoryResult<QueueTicket> {
        let scope = checked_scope(scope_key)?;
        let entry = self
            .store
            .allocate_queue_number(scope, user_id, cart_id, self.clock.now())
            .await?;

        debug!("Queue {}: issued number {}", scope, entry.queue_number);
        Ok(entry.into())
    }

    /// Admits waiting entries in number order until the scope has `capacity`
    /// admitted entries. Returns only the entries admitted by this call.
    pub async fn admit_next(&self, scope_key: &str, capacity: Option<i64>) -> InventoryResult<Vec<QueueEntry>> {
        let scope = checked_scope(scope_key)?;
        let capacity = capacity.unwrap_or(self.queue.admission_capacity);
        if capacity < 1 {
            return Err(InventoryError::InvalidRequest("capacity must be positive".to_string()));
        }

        let admitted = self
            .store
            .admit_waiting(scope, capacity, self.clock.now())
            .await?;
        if !admitted.is_empty() {
            info!("Queue {}: admitted {} entries", scope, admitted.len());
        }
        Ok(admitted)
    }

    pub async fn complete_queue_entry(&self, entry_id: Uuid) -> InventoryResult<QueueEntry> {
        self.store
            .complete_queue_entry(entry_id)
            .await?
            .ok_or(InventoryError::QueueEntryNotFound(entry_id))
    }

    pub async fn queue_position(&self, entry_id: Uuid) -> InventoryResult<QueuePosition> {
        let (entry, ahead) = self
            .store
            .queue_position(entry_id)
            .await?
            .ok_or(InventoryError::QueueEntryNotFound(entry_id))?;
        Ok(QueuePosition { entry, ahead })
    }
}
