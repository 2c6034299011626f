//! Durable per-business promise queue (§4.3): a request that is queued before
//! it's sent, and only removed once it completes or is explicitly dropped, so
//! that a process restart can replay it via [`crate::manager::Manager::promise_requests`].

use super::db;
use crate::error::Error;
use crate::request::RequestCore;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Namespace for deriving deterministic UUIDv5 promise keys. Fixed so that the
/// same request, replayed after a restart, gets the same key it had before.
const PROMISE_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x15, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0, 0x4f, 0xd4, 0x30, 0xc9,
]);

/// Derives the UUIDv5 key used to durably identify `core` within its business's
/// promise queue, per §4.3.
#[must_use]
pub fn promise_key(core: &RequestCore) -> String {
    let name = format!("{}:{}:{}", core.business_identifier, core.api_path, core.fingerprint());
    Uuid::new_v5(&PROMISE_NAMESPACE, name.as_bytes()).to_string()
}

pub struct PromiseStore {
    pool: SqlitePool,
}

impl PromiseStore {
    pub async fn open(pool: SqlitePool) -> Result<Self, Error> {
        db::ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Persists `core` and returns the key it was stored under (§4.5 step A).
    pub async fn add(&self, core: &RequestCore) -> Result<String, Error> {
        let key = promise_key(core);
        let row = core.to_persisted(&key)?;
        db::insert(&self.pool, &row).await?;
        Ok(key)
    }

    pub async fn remove(&self, key: &str) -> Result<(), Error> {
        db::delete(&self.pool, key).await
    }

    /// All requests still queued for `business_id`, in the order the DB returns
    /// them, decoded back into [`RequestCore`]. Used by `Manager::promise_requests`
    /// to replay requests left over from a previous process (§4.3, §4.5).
    pub async fn for_business(&self, business_id: &str) -> Result<Vec<RequestCore>, Error> {
        let rows = db::for_business(&self.pool, business_id).await?;
        rows.iter().map(RequestCore::from_persisted).collect()
    }

    pub async fn clear_business(&self, business_id: &str) -> Result<(), Error> {
        db::delete_for_business(&self.pool, business_id).await
    }

    pub async fn clear_all(&self) -> Result<(), Error> {
        db::delete_all(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Method;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite pool")
    }

    fn sample_core() -> RequestCore {
        let mut core = RequestCore::new("billing", Method::Post, "/invoices");
        core.promise.enable = true;
        core
    }

    #[tokio::test]
    async fn promise_key_is_deterministic_for_identical_requests() {
        assert_eq!(promise_key(&sample_core()), promise_key(&sample_core()));
    }

    #[tokio::test]
    async fn add_then_for_business_returns_the_queued_request() {
        let store = PromiseStore::open(memory_pool().await).await.unwrap();
        store.add(&sample_core()).await.unwrap();
        let queued = store.for_business("billing").await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].api_path, "/invoices");
    }

    #[tokio::test]
    async fn remove_drops_the_request_from_its_business_queue() {
        let store = PromiseStore::open(memory_pool().await).await.unwrap();
        let key = store.add(&sample_core()).await.unwrap();
        store.remove(&key).await.unwrap();
        let queued = store.for_business("billing").await.unwrap();
        assert!(queued.is_empty());
    }

    #[tokio::test]
    async fn clear_business_only_affects_that_business() {
        let store = PromiseStore::open(memory_pool().await).await.unwrap();
        store.add(&sample_core()).await.unwrap();
        let mut other = sample_core();
        other.business_identifier = "payroll".to_string();
        store.add(&other).await.unwrap();

        store.clear_business("billing").await.unwrap();

        assert!(store.for_business("billing").await.unwrap().is_empty());
        assert_eq!(store.for_business("payroll").await.unwrap().len(), 1);
    }
}
