//! Device-local state repository implementation

use crate::error::{Error, Result};
use crate::models::Document;
use crate::util::unix_millis_now;
use libsql::Connection;

const DOCUMENT_KEY: &str = "document";
const MARKER_KEY: &str = "write_marker";
const DEVICE_ID_KEY: &str = "device_id";
const LAST_USER_KEY: &str = "last_user_id";

/// Trait for device-local state storage operations (async)
#[allow(async_fn_in_trait)]
pub trait StateRepository {
    /// Load the persisted collection document, if any
    async fn load_document(&self) -> Result<Option<Document>>;

    /// Persist the collection document
    async fn save_document(&self, document: &Document) -> Result<()>;

    /// Load the local write marker (0 when never written)
    async fn load_marker(&self) -> Result<i64>;

    /// Persist the local write marker
    async fn save_marker(&self, marker: i64) -> Result<()>;

    /// Load the device identity, if one was generated before
    async fn load_device_id(&self) -> Result<Option<String>>;

    /// Persist the device identity
    async fn save_device_id(&self, device_id: &str) -> Result<()>;

    /// Load the id of the last account this device synced with
    async fn load_last_user(&self) -> Result<Option<String>>;

    /// Persist the id of the account this device is syncing with
    async fn save_last_user(&self, user_id: &str) -> Result<()>;
}

/// libSQL implementation of `StateRepository`
pub struct LibSqlStateRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlStateRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl StateRepository for LibSqlStateRepository<'_> {
    async fn load_document(&self) -> Result<Option<Document>> {
        match self.get_value(DOCUMENT_KEY).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save_document(&self, document: &Document) -> Result<()> {
        let raw = serde_json::to_string(document)?;
        self.set_value(DOCUMENT_KEY, &raw).await
    }

    async fn load_marker(&self) -> Result<i64> {
        let Some(raw) = self.get_value(MARKER_KEY).await? else {
            return Ok(0);
        };
        raw.trim()
            .parse()
            .map_err(|_| Error::Database(format!("invalid write marker '{raw}'")))
    }

    async fn save_marker(&self, marker: i64) -> Result<()> {
        self.set_value(MARKER_KEY, &marker.to_string()).await
    }

    async fn load_device_id(&self) -> Result<Option<String>> {
        self.get_value(DEVICE_ID_KEY).await
    }

    async fn save_device_id(&self, device_id: &str) -> Result<()> {
        self.set_value(DEVICE_ID_KEY, device_id).await
    }

    async fn load_last_user(&self) -> Result<Option<String>> {
        self.get_value(LAST_USER_KEY).await
    }

    async fn save_last_user(&self, user_id: &str) -> Result<()> {
        self.set_value(LAST_USER_KEY, user_id).await
    }
}

impl LibSqlStateRepository<'_> {
    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM local_state WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO local_state (key, value, updated_at) VALUES (?, ?, ?)",
                libsql::params![key, value, unix_millis_now()],
            )
            .await?;
        Ok(())
    }
}
