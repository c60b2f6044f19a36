//! In-process relay with realtime fan-out

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use super::relay::{
    Relay, RelayError, RelayResult, RelayWrite, RemoteRecord, Subscription, SyncIdentity,
};

#[derive(Debug, Default)]
struct MemoryRelayState {
    records: HashMap<String, RemoteRecord>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<RemoteRecord>>>,
    /// Logical timestamps of accepted writes, per user
    writes: HashMap<String, Vec<i64>>,
    offline: bool,
    unprovisioned: bool,
    realtime_disabled: bool,
    revision: u64,
}

/// Relay kept entirely in memory.
///
/// Clones share the same store, so several engines in one process behave
/// like devices talking to one backend. Switches for going offline or
/// losing the backing table let callers exercise the degraded paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryRelay {
    inner: Arc<Mutex<MemoryRelayState>>,
}

impl MemoryRelay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A relay that never offers a realtime channel
    #[must_use]
    pub fn polling_only() -> Self {
        let relay = Self::new();
        relay.lock().realtime_disabled = true;
        relay
    }

    fn lock(&self) -> MutexGuard<'_, MemoryRelayState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every call fail as if the network were down
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Make every call fail as if the backing table did not exist
    pub fn set_unprovisioned(&self, unprovisioned: bool) {
        self.lock().unprovisioned = unprovisioned;
    }

    /// Current row for `user_id`
    #[must_use]
    pub fn record(&self, user_id: &str) -> Option<RemoteRecord> {
        self.lock().records.get(user_id).cloned()
    }

    /// Logical timestamps of every accepted write for `user_id`, oldest first
    #[must_use]
    pub fn writes(&self, user_id: &str) -> Vec<i64> {
        self.lock().writes.get(user_id).cloned().unwrap_or_default()
    }

    /// Store a row written by some other client and notify subscribers
    pub fn publish(&self, user_id: &str, record: RemoteRecord) {
        let mut state = self.lock();
        Self::store(&mut state, user_id, record);
    }

    fn check_available(state: &MemoryRelayState) -> RelayResult<()> {
        if state.offline {
            return Err(RelayError::Unavailable("memory relay is offline".to_string()));
        }
        if state.unprovisioned {
            return Err(RelayError::SchemaMissing(
                "relation \"user_state\" does not exist".to_string(),
            ));
        }
        Ok(())
    }

    fn store(state: &mut MemoryRelayState, user_id: &str, mut record: RemoteRecord) {
        state.revision += 1;
        record.server_updated_at = Some(format!("rev-{}", state.revision));

        if let Some(senders) = state.subscribers.get_mut(user_id) {
            senders.retain(|sender| sender.send(record.clone()).is_ok());
        }
        state.records.insert(user_id.to_string(), record);
    }
}

impl Relay for MemoryRelay {
    async fn upsert(&self, identity: &SyncIdentity, write: &RelayWrite) -> RelayResult<()> {
        let mut state = self.lock();
        Self::check_available(&state)?;

        state
            .writes
            .entry(identity.user_id.clone())
            .or_default()
            .push(write.logical_timestamp);
        let record = RemoteRecord {
            snapshot: write.snapshot.clone(),
            logical_timestamp: write.logical_timestamp,
            device_id: write.device_id.clone(),
            server_updated_at: None,
        };
        Self::store(&mut state, &identity.user_id, record);
        Ok(())
    }

    async fn select(&self, identity: &SyncIdentity) -> RelayResult<Option<RemoteRecord>> {
        let state = self.lock();
        Self::check_available(&state)?;
        Ok(state.records.get(&identity.user_id).cloned())
    }

    async fn subscribe(&self, identity: &SyncIdentity) -> RelayResult<Option<Subscription>> {
        let mut state = self.lock();
        Self::check_available(&state)?;
        if state.realtime_disabled {
            return Ok(None);
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        state
            .subscribers
            .entry(identity.user_id.clone())
            .or_default()
            .push(sender);
        Ok(Some(Subscription::new(receiver)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity(user_id: &str) -> SyncIdentity {
        SyncIdentity::new(user_id, "token")
    }

    fn write(timestamp: i64) -> RelayWrite {
        RelayWrite {
            snapshot: json!({ "mood": "cosy" }),
            logical_timestamp: timestamp,
            device_id: "device-a".to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_then_select_returns_latest_row() {
        let relay = MemoryRelay::new();
        let alice = identity("alice");

        assert_eq!(relay.select(&alice).await.unwrap(), None);
        relay.upsert(&alice, &write(1_000)).await.unwrap();
        relay.upsert(&alice, &write(2_000)).await.unwrap();

        let record = relay.select(&alice).await.unwrap().unwrap();
        assert_eq!(record.logical_timestamp, 2_000);
        assert_eq!(record.device_id, "device-a");
        assert!(record.server_updated_at.is_some());
        assert_eq!(relay.writes("alice"), vec![1_000, 2_000]);
        assert_eq!(relay.select(&identity("bob")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn subscribers_receive_changes_for_their_user_only() {
        let relay = MemoryRelay::new();
        let mut alice_events = relay.subscribe(&identity("alice")).await.unwrap().unwrap();
        let mut bob_events = relay.subscribe(&identity("bob")).await.unwrap().unwrap();

        relay.upsert(&identity("alice"), &write(1_000)).await.unwrap();

        let event = alice_events.next().await.unwrap();
        assert_eq!(event.logical_timestamp, 1_000);
        assert_eq!(bob_events.try_next(), None);
    }

    #[tokio::test]
    async fn dropped_subscriptions_are_pruned() {
        let relay = MemoryRelay::new();
        let alice = identity("alice");
        drop(relay.subscribe(&alice).await.unwrap());

        relay.upsert(&alice, &write(1_000)).await.unwrap();

        assert!(relay.lock().subscribers["alice"].is_empty());
    }

    #[tokio::test]
    async fn failure_switches() {
        let relay = MemoryRelay::new();
        let alice = identity("alice");

        relay.set_offline(true);
        assert!(matches!(
            relay.upsert(&alice, &write(1)).await,
            Err(RelayError::Unavailable(_))
        ));
        relay.set_offline(false);

        relay.set_unprovisioned(true);
        let error = relay.select(&alice).await.unwrap_err();
        assert!(error.is_permanent());
        assert!(relay.writes("alice").is_empty());
    }

    #[tokio::test]
    async fn polling_only_relay_has_no_channel() {
        let relay = MemoryRelay::polling_only();
        assert!(relay.subscribe(&identity("alice")).await.unwrap().is_none());
    }
}
