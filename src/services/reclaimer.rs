use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, error, info};

use super::InventoryService;
use crate::error::InventoryResult;
use crate::store::ReleasedSeat;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReclaimReport {
    pub released: Vec<ReleasedSeat>,
    pub expired_carts: u64,
}

impl InventoryService {
    /// Returns every lapsed hold to `AVAILABLE` and marks lapsed carts
    /// `EXPIRED`, in one store transaction. Sold seats are never touched.
    ///
    /// Running it twice in a row is harmless; the second run finds nothing.
    pub async fn release_expired_reservations(&self) -> InventoryResult<ReclaimReport> {
        let now = self.clock.now();
        let outcome = self.store.release_expired(now).await?;

        if outcome.released.is_empty() && outcome.expired_carts == 0 {
            debug!("Reclaim: nothing expired");
            return Ok(ReclaimReport::default());
        }

        info!(
            "Reclaim: released {} seats, expired {} carts",
            outcome.released.len(),
            outcome.expired_carts
        );

        if let Some(cache) = &self.cache {
            let sessions: BTreeSet<_> = outcome.released.iter().map(|s| s.session_id).collect();
            cache.invalidate_sessions(sessions).await;
        }

        Ok(ReclaimReport {
            released: outcome.released,
            expired_carts: outcome.expired_carts,
        })
    }
}

/// Background loop: reclaim, then sleep. A failed pass is logged and the next
/// one runs on schedule.
pub async fn run_reclaimer(service: InventoryService, every: Duration) {
    info!("Reclaimer started, interval {:?}", every);
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = service.release_expired_reservations().await {
            error!("Reclaim pass failed: {:?}", e);
        }
    }
}
