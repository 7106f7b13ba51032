//! Seat inventory operations.
//!
//! [`InventoryService`] is the entry point for every operation; its methods
//! are spread over one file per concern:
//!
//! - `generator`: seat set creation from the auditorium layout
//! - `projector`: display status of a seat at a given instant (pure)
//! - `holds`: cart-scoped, all-or-nothing seat holds
//! - `reclaimer`: periodic release of lapsed holds and carts
//! - `queue`: per-scope admission numbers
//!
//! The service holds no locks of its own. Everything that must have exactly
//! one winner is delegated to a single [`InventoryStore`] call.

use std::sync::Arc;

use crate::cache::CacheService;
use crate::clock::Clock;
use crate::config::{HoldConfig, QueueConfig};
use crate::store::InventoryStore;

pub mod generator;
pub mod holds;
pub mod projector;
pub mod queue;
pub mod reclaimer;

#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn InventoryStore>,
    cache: Option<CacheService>,
    clock: Arc<dyn Clock>,
    holds: HoldConfig,
    queue: QueueConfig,
}

impl InventoryService {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        cache: Option<CacheService>,
        clock: Arc<dyn Clock>,
        holds: HoldConfig,
        queue: QueueConfig,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            holds,
            queue,
        }
    }

    async fn invalidate_session(&self, session_id: uuid::Uuid) {
        if let Some(cache) = &self.cache {
            cache.invalidate_seats(session_id).await;
        }
    }
}
