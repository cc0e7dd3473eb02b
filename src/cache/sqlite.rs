use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

use super::{CacheEntry, CacheError, CacheStore};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS lookup_cache (
    cache_key TEXT PRIMARY KEY,
    code_type TEXT NOT NULL,
    entry     TEXT NOT NULL,
    stored_at TEXT NOT NULL
)
"#;

/// Cache entries as JSON documents in a sqlite table, one row per key.
#[derive(Clone)]
pub struct SqliteCacheStore {
    pub pool: SqlitePool,
}

impl SqliteCacheStore {
    // SECURITY: never include raw DSNs in tracing spans.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;
        let store = Self::from_pool(pool).await?;
        info!(max_connections, "connected to cache db");
        Ok(store)
    }

    /// Wrap an existing pool, creating the table if needed.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, CacheError> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let row = sqlx::query("SELECT entry FROM lookup_cache WHERE cache_key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let raw: String = row.try_get("entry")?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let raw = serde_json::to_string(entry)?;
        sqlx::query(
            r#"
            INSERT INTO lookup_cache (cache_key, code_type, entry, stored_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(cache_key) DO UPDATE SET
                code_type = excluded.code_type,
                entry = excluded.entry,
                stored_at = excluded.stored_at
            "#,
        )
        .bind(&entry.key)
        .bind(entry.code_type.as_str())
        .bind(raw)
        .bind(entry.stored_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let res = sqlx::query("DELETE FROM lookup_cache WHERE cache_key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::sample_entry;

    // One connection: every `sqlite::memory:` connection is its own database.
    async fn store() -> SqliteCacheStore {
        SqliteCacheStore::connect("sqlite::memory:", 1).await.unwrap()
    }

    #[tokio::test]
    async fn round_trips_an_entry() {
        let store = store().await;
        let entry = sample_entry("ISBN:0743273567");
        store.put(&entry).await.unwrap();

        let got = store.get("ISBN:0743273567").await.unwrap().unwrap();
        assert_eq!(got, entry);
        assert!(store.get("ISBN:0306406152").await.unwrap().is_none());
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_overwrites_and_remove_deletes() {
        let store = store().await;
        let mut entry = sample_entry("UPC:012345678905");
        store.put(&entry).await.unwrap();
        entry.message = "updated".into();
        store.put(&entry).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lookup_cache")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            store.get("UPC:012345678905").await.unwrap().unwrap().message,
            "updated"
        );

        assert!(store.remove("UPC:012345678905").await.unwrap());
        assert!(store.get("UPC:012345678905").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn undecodable_row_is_an_error() {
        let store = store().await;
        sqlx::query("INSERT INTO lookup_cache VALUES ('ASIN:B00005N5PF', 'ASIN', '{oops', '')")
            .execute(&store.pool)
            .await
            .unwrap();
        assert!(matches!(
            store.get("ASIN:B00005N5PF").await,
            Err(CacheError::Serialization(_))
        ));
    }
}
