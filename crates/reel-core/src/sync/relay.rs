//! Relay store contract shared by every backend.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid relay configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Relay HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Relay unreachable: {0}")]
    Unavailable(String),
    #[error("Relay rejected credentials: {0}")]
    Unauthorized(String),
    #[error("Relay schema is not provisioned: {0}")]
    SchemaMissing(String),
    #[error("Relay API error: {0}")]
    Api(String),
    #[error("Invalid relay payload: {0}")]
    InvalidPayload(String),
}

impl RelayError {
    /// Retrying cannot succeed for the lifetime of the session
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::SchemaMissing(_))
    }
}

pub type RelayResult<T> = Result<T, RelayError>;

/// Signed-in account the relay row belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct SyncIdentity {
    pub user_id: String,
    pub access_token: String,
}

impl SyncIdentity {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }
}

impl fmt::Debug for SyncIdentity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncIdentity")
            .field("user_id", &self.user_id)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Payload of an upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayWrite {
    pub snapshot: Value,
    pub logical_timestamp: i64,
    pub device_id: String,
}

/// The relay's single row for a user.
///
/// `snapshot` is untrusted: it was written by some other client and is only
/// ever read through the snapshot applier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub snapshot: Value,
    pub logical_timestamp: i64,
    pub device_id: String,
    /// Relay wall clock at write time, informational only
    pub server_updated_at: Option<String>,
}

/// Live change notifications for one user's row.
///
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<RemoteRecord>,
}

impl Subscription {
    #[must_use]
    pub const fn new(events: mpsc::UnboundedReceiver<RemoteRecord>) -> Self {
        Self { events }
    }

    /// Next change event, `None` once the channel is closed
    pub async fn next(&mut self) -> Option<RemoteRecord> {
        self.events.recv().await
    }

    /// Next already-delivered event without waiting
    pub fn try_next(&mut self) -> Option<RemoteRecord> {
        self.events.try_recv().ok()
    }
}

/// Key-value-per-user store the sync engine pushes to and pulls from.
pub trait Relay: Send + Sync + 'static {
    /// Insert or replace the row for `identity.user_id`
    fn upsert(
        &self,
        identity: &SyncIdentity,
        write: &RelayWrite,
    ) -> impl Future<Output = RelayResult<()>> + Send;

    /// Read the row for `identity.user_id`
    fn select(
        &self,
        identity: &SyncIdentity,
    ) -> impl Future<Output = RelayResult<Option<RemoteRecord>>> + Send;

    /// Subscribe to changes of the row.
    ///
    /// Returns `Ok(None)` when the backend has no realtime capability; the
    /// engine then relies on polling alone.
    fn subscribe(
        &self,
        identity: &SyncIdentity,
    ) -> impl Future<Output = RelayResult<Option<Subscription>>> + Send;
}
