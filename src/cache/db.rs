//! Durable mirror of the cache for the `cache` table (§6).

use crate::constants::CACHE_TABLE;
use crate::error::Error;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

/// A raw row of the `cache` table, independent of in-memory tiering.
#[derive(Debug, Clone)]
pub struct CacheRow {
    pub id: String,
    pub data: String,
    pub is_lru: bool,
    pub create_time: DateTime<Utc>,
    pub duration_secs: Option<i64>,
}

pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), Error> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {CACHE_TABLE} (
            id VARCHAR(64) PRIMARY KEY,
            data TEXT NOT NULL,
            is_lru TINYINT NOT NULL,
            create_time VARCHAR(32) NOT NULL,
            duration INTEGER NULL
        )"
    ))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn load_all(pool: &SqlitePool) -> Result<Vec<CacheRow>, Error> {
    let rows = sqlx::query(&format!("SELECT id, data, is_lru, create_time, duration FROM {CACHE_TABLE}"))
        .fetch_all(pool)
        .await?;
    rows.into_iter()
        .map(|row| {
            let create_time: String = row.try_get("create_time")?;
            let create_time = DateTime::parse_from_rfc3339(&create_time)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
            Ok(CacheRow {
                id: row.try_get("id")?,
                data: row.try_get("data")?,
                is_lru: row.try_get::<i64, _>("is_lru")? != 0,
                create_time,
                duration_secs: row.try_get("duration")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(Error::from)
}

pub async fn upsert(pool: &SqlitePool, row: &CacheRow) -> Result<(), Error> {
    sqlx::query(&format!(
        "INSERT INTO {CACHE_TABLE} (id, data, is_lru, create_time, duration)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET data = excluded.data, is_lru = excluded.is_lru,
            create_time = excluded.create_time, duration = excluded.duration"
    ))
    .bind(&row.id)
    .bind(&row.data)
    .bind(i64::from(row.is_lru))
    .bind(row.create_time.to_rfc3339())
    .bind(row.duration_secs)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: &str) -> Result<(), Error> {
    sqlx::query(&format!("DELETE FROM {CACHE_TABLE} WHERE id = ?"))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_all(pool: &SqlitePool) -> Result<(), Error> {
    sqlx::query(&format!("DELETE FROM {CACHE_TABLE}")).execute(pool).await?;
    Ok(())
}
