//! The two-tier response cache (§4.2): a bounded LRU tier and an unbounded
//! pinned tier, both mirrored durably into the `cache` table.

use super::db::{self, CacheRow};
use crate::error::Error;
use crate::lru::LruMap;
use crate::response::RawResponse;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct CacheEntry {
    response_json: String,
    create_time: DateTime<Utc>,
    duration: Option<Duration>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.duration {
            None => false,
            Some(duration) => {
                let elapsed = now.signed_duration_since(self.create_time);
                elapsed
                    .to_std()
                    .map(|elapsed| elapsed > duration)
                    .unwrap_or(false)
            }
        }
    }

    fn response(&self) -> Result<RawResponse, Error> {
        serde_json::from_str(&self.response_json).map_err(Error::from)
    }
}

/// Durable, two-tier cache of raw responses keyed by a request's MD5 fingerprint.
///
/// The LRU tier evicts its least-recently-used entry once it exceeds capacity,
/// and the eviction callback deletes the corresponding DB row so the two stay
/// coherent (§4.1, §4.2). The pinned tier never evicts on its own; entries leave
/// it only via explicit removal or expiry.
pub struct CacheStore {
    pool: SqlitePool,
    lru_tier: Mutex<LruMap<String, CacheEntry>>,
    pinned_tier: Mutex<HashMap<String, CacheEntry>>,
}

impl CacheStore {
    pub async fn open(pool: SqlitePool, lru_capacity: usize) -> Result<Self, Error> {
        db::ensure_schema(&pool).await?;
        let rows = db::load_all(&pool).await?;

        let evict_pool = pool.clone();
        let on_evict = Arc::new(move |key: String, _entry: CacheEntry| {
            let pool = evict_pool.clone();
            tokio::spawn(async move {
                let _ = db::delete(&pool, &key).await;
            });
        });

        let mut lru_tier = LruMap::new(lru_capacity.max(1), Some(on_evict));
        let mut pinned_tier = HashMap::new();

        for row in rows {
            let entry = CacheEntry {
                response_json: row.data,
                create_time: row.create_time,
                duration: row.duration_secs.map(|secs| Duration::from_secs(secs.max(0) as u64)),
            };
            if row.is_lru {
                lru_tier.put(row.id, entry);
            } else {
                pinned_tier.insert(row.id, entry);
            }
        }

        Ok(Self {
            pool,
            lru_tier: Mutex::new(lru_tier),
            pinned_tier: Mutex::new(pinned_tier),
        })
    }

    /// Looks up `key`, preferring the LRU tier. Expired entries are treated as
    /// a miss and removed from both memory and the DB.
    pub async fn get(&self, key: &str) -> Option<RawResponse> {
        let now = Utc::now();

        {
            let mut tier = self.lru_tier.lock().await;
            if let Some(entry) = tier.get(&key.to_string()).cloned() {
                if entry.is_expired(now) {
                    tier.remove(&key.to_string());
                    drop(tier);
                    let _ = db::delete(&self.pool, key).await;
                    return None;
                }
                return entry.response().ok();
            }
        }

        let mut tier = self.pinned_tier.lock().await;
        if let Some(entry) = tier.get(key).cloned() {
            if entry.is_expired(now) {
                tier.remove(key);
                drop(tier);
                let _ = db::delete(&self.pool, key).await;
                return None;
            }
            return entry.response().ok();
        }
        None
    }

    pub async fn put(
        &self,
        key: String,
        response: &RawResponse,
        use_lru: bool,
        duration: Option<Duration>,
    ) -> Result<(), Error> {
        let response_json = serde_json::to_string(response)?;
        let create_time = Utc::now();
        let entry = CacheEntry {
            response_json: response_json.clone(),
            create_time,
            duration,
        };

        if use_lru {
            self.lru_tier.lock().await.put(key.clone(), entry);
        } else {
            self.pinned_tier.lock().await.insert(key.clone(), entry);
        }

        db::upsert(
            &self.pool,
            &CacheRow {
                id: key,
                data: response_json,
                is_lru: use_lru,
                create_time,
                duration_secs: duration.map(|d| d.as_secs() as i64),
            },
        )
        .await
    }

    pub async fn remove(&self, key: &str) -> Result<(), Error> {
        self.lru_tier.lock().await.remove(&key.to_string());
        self.pinned_tier.lock().await.remove(key);
        db::delete(&self.pool, key).await
    }

    pub async fn clear(&self) -> Result<(), Error> {
        self.lru_tier.lock().await.clear();
        self.pinned_tier.lock().await.clear();
        db::delete_all(&self.pool).await
    }
}
