//! Shared local store used by the sync engine, the cache, and the clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::cache::CacheEntry;
use crate::db::{
    CacheRepository, Database, LibSqlCacheRepository, LibSqlStateRepository, StateRepository,
};
use crate::models::Document;
use crate::Result;

/// Thread-safe handle over the device-local database.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LocalStore {
    /// Open the store at the given filesystem path.
    ///
    /// A file that is not a database is moved aside and a fresh one created.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local database at {} is unreadable: {}. Moving it aside and starting fresh.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Path of the backing file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn is_corrupted_db_error(error: &crate::Error) -> bool {
        let message = error.to_string().to_ascii_lowercase();
        message.contains("file is not a database") || message.contains("malformed")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let base_name = db_path
                .file_name()
                .map_or_else(|| "reel.db".into(), |name| name.to_string_lossy());
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local DB file from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };
        // WAL and shared-memory sidecars belong to the quarantined file
        let sidecar_prefix = format!("{base_name}-");

        for entry in std::fs::read_dir(parent)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(&sidecar_prefix) {
                let path = entry.path();
                std::fs::remove_file(&path)?;
                tracing::warn!("Removed stale database sidecar {}", path.display());
            }
        }

        Ok(())
    }

    /// Load the persisted document.
    pub async fn load_document(&self) -> Result<Option<Document>> {
        let db = self.db.lock().await;
        let repo = LibSqlStateRepository::new(db.connection());
        repo.load_document().await
    }

    /// Persist the document and write marker together.
    pub async fn save_snapshot(&self, document: &Document, marker: i64) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlStateRepository::new(db.connection());
        repo.save_document(document).await?;
        repo.save_marker(marker).await
    }

    /// Load the local write marker.
    pub async fn load_marker(&self) -> Result<i64> {
        let db = self.db.lock().await;
        let repo = LibSqlStateRepository::new(db.connection());
        repo.load_marker().await
    }

    /// Load the stored device identity.
    pub async fn load_device_id(&self) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let repo = LibSqlStateRepository::new(db.connection());
        repo.load_device_id().await
    }

    /// Persist the device identity.
    pub async fn save_device_id(&self, device_id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlStateRepository::new(db.connection());
        repo.save_device_id(device_id).await
    }

    /// Load the last account this device synced with.
    pub async fn load_last_user(&self) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let repo = LibSqlStateRepository::new(db.connection());
        repo.load_last_user().await
    }

    /// Record the account this device is syncing with.
    pub async fn save_last_user(&self, user_id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlStateRepository::new(db.connection());
        repo.save_last_user(user_id).await
    }

    /// Load a cache entry regardless of age.
    pub async fn load_cache_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let db = self.db.lock().await;
        let repo = LibSqlCacheRepository::new(db.connection());
        repo.load_entry(key).await
    }

    /// Insert or replace a cache entry.
    pub async fn store_cache_entry(&self, entry: &CacheEntry) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlCacheRepository::new(db.connection());
        repo.store_entry(entry).await
    }
}
