//! Durable mirror of in-flight promises for the `promise` table (§6).

use crate::constants::PROMISE_TABLE;
use crate::error::Error;
use crate::request::PersistedRequest;
use sqlx::SqlitePool;

pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), Error> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {PROMISE_TABLE} (
            id VARCHAR(64) PRIMARY KEY,
            business_id VARCHAR(64) NOT NULL,
            path VARCHAR(128) NOT NULL,
            data TEXT NOT NULL
        )"
    ))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert(pool: &SqlitePool, row: &PersistedRequest) -> Result<(), Error> {
    sqlx::query(&format!(
        "INSERT INTO {PROMISE_TABLE} (id, business_id, path, data)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET business_id = excluded.business_id,
            path = excluded.path, data = excluded.data"
    ))
    .bind(&row.id)
    .bind(&row.business_id)
    .bind(&row.path)
    .bind(&row.data)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: &str) -> Result<(), Error> {
    sqlx::query(&format!("DELETE FROM {PROMISE_TABLE} WHERE id = ?"))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn for_business(pool: &SqlitePool, business_id: &str) -> Result<Vec<PersistedRequest>, Error> {
    sqlx::query_as::<_, PersistedRequest>(&format!(
        "SELECT id, business_id, path, data FROM {PROMISE_TABLE} WHERE business_id = ?"
    ))
    .bind(business_id)
    .fetch_all(pool)
    .await
    .map_err(Error::from)
}

pub async fn delete_for_business(pool: &SqlitePool, business_id: &str) -> Result<(), Error> {
    sqlx::query(&format!("DELETE FROM {PROMISE_TABLE} WHERE business_id = ?"))
        .bind(business_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_all(pool: &SqlitePool) -> Result<(), Error> {
    sqlx::query(&format!("DELETE FROM {PROMISE_TABLE}")).execute(pool).await?;
    Ok(())
}
