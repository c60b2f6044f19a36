//! Metadata cache repository implementation

use crate::cache::CacheEntry;
use crate::error::Result;
use libsql::Connection;

/// Trait for cache entry storage operations (async)
#[allow(async_fn_in_trait)]
pub trait CacheRepository {
    /// Load the entry for `key`, regardless of its age
    async fn load_entry(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Insert or replace an entry
    async fn store_entry(&self, entry: &CacheEntry) -> Result<()>;
}

/// libSQL implementation of `CacheRepository`
pub struct LibSqlCacheRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlCacheRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl CacheRepository for LibSqlCacheRepository<'_> {
    async fn load_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT key, value, written_at FROM cache_entries WHERE key = ?",
                [key],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let raw: String = row.get(1)?;
        Ok(Some(CacheEntry {
            key: row.get(0)?,
            value: serde_json::from_str(&raw)?,
            written_at: row.get(2)?,
        }))
    }

    async fn store_entry(&self, entry: &CacheEntry) -> Result<()> {
        let raw = serde_json::to_string(&entry.value)?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO cache_entries (key, value, written_at) VALUES (?, ?, ?)",
                libsql::params![entry.key.as_str(), raw, entry.written_at],
            )
            .await?;
        Ok(())
    }
}
