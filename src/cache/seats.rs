use futures::future::join_all;
use redis::AsyncCommands;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::CacheService;
use crate::models::Seat;

fn seats_version_key(session_id: Uuid) -> String {
    format!("seats:{}:version", session_id)
}

fn seats_key(session_id: Uuid, version: u64) -> String {
    format!("seats:{}:v{}", session_id, version)
}

/// Result of a seat cache read.
#[derive(Debug)]
pub enum SeatLookup {
    Hit(Vec<Seat>),
    /// Nothing cached. Rows read from the store after this lookup may be put
    /// back under `version`; an invalidation in between makes that put dead.
    Miss { version: u64 },
    Unavailable,
}

impl CacheService {
    // Raw seat rows, not projected: projection depends on "now"
    pub async fn get_seats(&self, session_id: Uuid) -> SeatLookup {
        let mut conn = self.redis.conn.clone();
        let version: Option<u64> = match conn.get(seats_version_key(session_id)).await {
            Ok(version) => version,
            Err(e) => {
                warn!("seat cache version read failed for session {}: {:?}", session_id, e);
                return SeatLookup::Unavailable;
            }
        };
        let version = version.unwrap_or(0);

        let data: Option<String> = match conn.get(seats_key(session_id, version)).await {
            Ok(data) => data,
            Err(e) => {
                warn!("seat cache read failed for session {}: {:?}", session_id, e);
                return SeatLookup::Unavailable;
            }
        };
        let Some(data) = data else {
            return SeatLookup::Miss { version };
        };

        match serde_json::from_str(&data) {
            Ok(seats) => {
                debug!("seat cache hit for session {} (v{})", session_id, version);
                SeatLookup::Hit(seats)
            }
            Err(e) => {
                warn!("seat cache entry for session {} is corrupt: {:?}", session_id, e);
                SeatLookup::Miss { version }
            }
        }
    }

    /// Caches rows read after a [`SeatLookup::Miss`] under the version that
    /// lookup saw.
    pub async fn put_seats(&self, session_id: Uuid, version: u64, seats: &[Seat]) {
        let data = match serde_json::to_string(seats) {
            Ok(data) => data,
            Err(e) => {
                warn!("failed to serialize seats for session {}: {:?}", session_id, e);
                return;
            }
        };
        let mut conn = self.redis.conn.clone();
        let result: Result<(), _> = conn
            .set_ex(seats_key(session_id, version), data, self.seat_ttl_seconds)
            .await;
        if let Err(e) = result {
            warn!("seat cache write failed for session {}: {:?}", session_id, e);
        }
    }

    /// Bumps the session's version so every earlier entry, and every put
    /// still in flight, becomes unreachable.
    pub async fn invalidate_seats(&self, session_id: Uuid) {
        let mut conn = self.redis.conn.clone();
        let bumped: Result<u64, _> = conn.incr(seats_version_key(session_id), 1u64).await;
        let version = match bumped {
            Ok(version) => version,
            Err(e) => {
                warn!("failed to invalidate seat cache for session {}: {:?}", session_id, e);
                return;
            }
        };
        debug!("invalidated seat cache for session {} (now v{})", session_id, version);

        let previous = seats_key(session_id, version - 1);
        if let Err(e) = conn.del::<_, ()>(&previous).await {
            debug!("stale seat cache entry {} left to expire: {:?}", previous, e);
        }
    }

    pub async fn invalidate_sessions(&self, session_ids: impl IntoIterator<Item = Uuid>) {
        join_all(session_ids.into_iter().map(|id| self.invalidate_seats(id))).await;
    }
}
