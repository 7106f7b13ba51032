use crate::redis_client::RedisClient;

pub mod seats;

/// Best-effort Redis cache in front of the seat tables.
///
/// Nothing here is authoritative: every read is re-projected against the
/// current time, and every failure degrades to a store read.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    seat_ttl_seconds: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, seat_ttl_seconds: u64) -> Self {
        Self {
            redis,
            seat_ttl_seconds,
        }
    }
}
