// [libs/domain/models/src/cache.rs]
//! Cache entry shape shared between the synthesis cache and the
//! classification cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub hit_count: u64,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, inserted_at: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self {
            value,
            inserted_at,
            expires_at: inserted_at + ttl,
            hit_count: 0,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub hit_count: u64,
    pub miss_count: u64,
}
