//! Shared handle over the in-memory collection document.
//!
//! UI code, the sync session and the snapshot applier all hold clones of one
//! [`SharedState`]. The document lives behind a synchronous mutex that is
//! never held across an `.await`; persistence happens afterwards under a
//! separate async lock so the newest snapshot is always the one written last.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{watch, Mutex as AsyncMutex};

use crate::db::LocalStore;
use crate::models::Document;
use crate::sync::{merge_import, MergeReport, SnapshotFields, WriteMarker};
use crate::util::unix_millis_now;
use crate::Result;

/// Where a document change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Read from the local store at startup
    Loaded,
    /// Edit made on this device
    Local,
    /// Snapshot received from another device
    Remote,
}

/// Revision signal for observers of the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub revision: u64,
    pub origin: ChangeOrigin,
    pub marker: i64,
}

#[derive(Debug)]
struct AppState {
    document: Document,
    marker: WriteMarker,
    revision: u64,
    /// Set while a remote snapshot is copied in, so the write is not stamped
    /// or pushed as a local edit
    applying_remote: bool,
}

impl AppState {
    fn record_write(&mut self) -> StateChange {
        self.revision += 1;
        let origin = if self.applying_remote {
            ChangeOrigin::Remote
        } else {
            self.marker.stamp(unix_millis_now());
            ChangeOrigin::Local
        };
        StateChange {
            revision: self.revision,
            origin,
            marker: self.marker.value(),
        }
    }
}

struct StateInner {
    app: Mutex<AppState>,
    store: LocalStore,
    persist_lock: AsyncMutex<()>,
    local_edits: watch::Sender<i64>,
    changes: watch::Sender<StateChange>,
}

/// Cloneable handle over the document, its write marker and the local store
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<StateInner>,
}

impl SharedState {
    /// Load the persisted document and marker from `store`
    pub async fn load(store: LocalStore) -> Result<Self> {
        let document = store.load_document().await?.unwrap_or_default();
        let marker = store.load_marker().await?;
        tracing::debug!(
            "Loaded document with {} items and {} lists at marker {}",
            document.items.len(),
            document.lists.len(),
            marker
        );

        let initial = StateChange {
            revision: 0,
            origin: ChangeOrigin::Loaded,
            marker,
        };
        let (local_edits, _) = watch::channel(marker);
        let (changes, _) = watch::channel(initial);

        Ok(Self {
            inner: Arc::new(StateInner {
                app: Mutex::new(AppState {
                    document,
                    marker: WriteMarker::new(marker),
                    revision: 0,
                    applying_remote: false,
                }),
                store,
                persist_lock: AsyncMutex::new(()),
                local_edits,
                changes,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, AppState> {
        self.inner.app.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn store(&self) -> &LocalStore {
        &self.inner.store
    }

    /// Clone of the current document
    #[must_use]
    pub fn document(&self) -> Document {
        self.lock().document.clone()
    }

    /// Run `read` against the current document without cloning it
    pub fn read<T>(&self, read: impl FnOnce(&Document) -> T) -> T {
        read(&self.lock().document)
    }

    #[must_use]
    pub fn marker(&self) -> i64 {
        self.lock().marker.value()
    }

    /// Document and marker taken under one lock
    #[must_use]
    pub fn snapshot(&self) -> (Document, i64) {
        let app = self.lock();
        (app.document.clone(), app.marker.value())
    }

    /// Observe document revisions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StateChange> {
        self.inner.changes.subscribe()
    }

    /// Observe the marker of local edits only
    pub(crate) fn subscribe_local_edits(&self) -> watch::Receiver<i64> {
        self.inner.local_edits.subscribe()
    }

    /// Apply a local edit.
    ///
    /// The edit is visible immediately; the marker is stamped, the sync
    /// session is notified and the new state is persisted before returning.
    pub async fn mutate<T>(&self, edit: impl FnOnce(&mut Document) -> T) -> Result<T> {
        let (value, change) = {
            let mut app = self.lock();
            let value = edit(&mut app.document);
            (value, app.record_write())
        };
        self.publish(change).await?;
        Ok(value)
    }

    /// Replace the present fields of a remote snapshot if it is newer than
    /// local state. Returns whether it was applied.
    pub(crate) async fn apply_remote(
        &self,
        fields: SnapshotFields,
        logical_timestamp: i64,
    ) -> Result<bool> {
        let change = {
            let mut app = self.lock();
            if !app.marker.is_older_than(logical_timestamp) {
                return Ok(false);
            }

            app.applying_remote = true;
            fields.apply_to(&mut app.document);
            app.marker.observe_remote(logical_timestamp);
            let change = app.record_write();
            app.applying_remote = false;
            change
        };
        self.publish(change).await?;
        Ok(true)
    }

    /// Merge an imported document into local state.
    ///
    /// Nothing is stamped or pushed when the import adds nothing new.
    pub async fn import(&self, incoming: &Document) -> Result<MergeReport> {
        let (report, change) = {
            let mut app = self.lock();
            let mut merged = app.document.clone();
            let report = merge_import(&mut merged, incoming);
            if report.is_empty() {
                return Ok(report);
            }
            app.document = merged;
            (report, app.record_write())
        };
        self.publish(change).await?;
        Ok(report)
    }

    /// Store this device's sync toggle.
    ///
    /// The toggle is not a collection edit: the marker is left alone and the
    /// sync session is not notified.
    pub async fn set_sync_enabled(&self, enabled: bool) -> Result<()> {
        let change = {
            let mut app = self.lock();
            if app.document.sync_enabled == Some(enabled) {
                return Ok(());
            }
            app.document.sync_enabled = Some(enabled);
            app.revision += 1;
            StateChange {
                revision: app.revision,
                origin: ChangeOrigin::Local,
                marker: app.marker.value(),
            }
        };
        self.inner.changes.send_replace(change);
        self.persist().await
    }

    /// Forget the write history, used when a different account signs in
    pub async fn reset_marker(&self) -> Result<()> {
        self.lock().marker.reset();
        self.persist().await
    }

    async fn publish(&self, change: StateChange) -> Result<()> {
        if change.origin == ChangeOrigin::Local {
            self.inner.local_edits.send_replace(change.marker);
        }
        self.inner.changes.send_replace(change);
        self.persist().await
    }

    async fn persist(&self) -> Result<()> {
        let _guard = self.inner.persist_lock.lock().await;
        let (document, marker) = self.snapshot();
        self.inner.store.save_snapshot(&document, marker).await
    }
}
