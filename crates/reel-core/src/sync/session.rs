//! Sync session controller and its background loop.
//!
//! [`SyncEngine`] decides whether a session should run (signed in and sync
//! enabled) and owns the pieces that outlive a session: the generation
//! counter, the push lock and the status channel. Each session is one task
//! multiplexing local edits, the debounce deadline, the poll interval,
//! realtime events and commands in a single `select!` loop.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::apply::apply_snapshot;
use super::debounce::Debouncer;
use super::identity::DeviceId;
use super::relay::{Relay, RelayError, RelayWrite, RemoteRecord, Subscription, SyncIdentity};
use super::status::{SessionEvent, SessionState};
use crate::config::SyncTuning;
use crate::state::SharedState;
use crate::Result;

#[derive(Debug)]
enum SessionCommand {
    SyncNow(oneshot::Sender<SessionState>),
    Shutdown,
}

struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    task: JoinHandle<()>,
}

/// Lets work started by one session recognize that it has been superseded
#[derive(Debug, Clone)]
struct GenerationGuard {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl GenerationGuard {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}

/// Controller for cross-device sync of one [`SharedState`]
pub struct SyncEngine<R: Relay> {
    relay: Arc<R>,
    state: SharedState,
    device_id: DeviceId,
    tuning: SyncTuning,
    generation: Arc<AtomicU64>,
    /// Marker of the newest snapshot pushed; its lock serializes pushes
    last_pushed: Arc<AsyncMutex<i64>>,
    status: Arc<watch::Sender<SessionState>>,
    identity: Option<SyncIdentity>,
    sync_enabled: bool,
    session: Option<SessionHandle>,
}

impl<R: Relay> SyncEngine<R> {
    /// Create an idle engine. Sync starts once an identity is set.
    pub fn new(relay: Arc<R>, state: SharedState, device_id: DeviceId, tuning: SyncTuning) -> Self {
        let sync_enabled = state.read(crate::models::Document::sync_enabled);
        let (status, _) = watch::channel(SessionState::Off);
        Self {
            relay,
            state,
            device_id,
            tuning,
            generation: Arc::new(AtomicU64::new(0)),
            last_pushed: Arc::new(AsyncMutex::new(0)),
            status: Arc::new(status),
            identity: None,
            sync_enabled,
            session: None,
        }
    }

    /// Sign in (`Some`) or out (`None`).
    ///
    /// A different account than the one this device last synced with
    /// starts from a reset write marker.
    pub async fn set_identity(&mut self, identity: Option<SyncIdentity>) -> Result<()> {
        if self.identity == identity {
            return Ok(());
        }
        self.stop();

        if let Some(identity) = &identity {
            let store = self.state.store();
            let last_user = store.load_last_user().await?;
            if last_user
                .as_deref()
                .is_some_and(|last_user| last_user != identity.user_id)
            {
                tracing::info!(
                    "Signed-in account changed to {}; resetting local write marker",
                    identity.user_id
                );
                self.state.reset_marker().await?;
                *self.last_pushed.lock().await = 0;
            }
            store.save_last_user(&identity.user_id).await?;
        }

        self.identity = identity;
        self.reconcile();
        Ok(())
    }

    /// Turn sync on or off for this device.
    ///
    /// The choice is stored with the document but is not treated as an edit,
    /// so re-enabling never makes stale local state look newer than the relay.
    pub async fn set_sync_enabled(&mut self, enabled: bool) -> Result<()> {
        if !enabled {
            self.sync_enabled = false;
            self.reconcile();
        }
        self.state.set_sync_enabled(enabled).await?;
        self.sync_enabled = enabled;
        self.reconcile();
        Ok(())
    }

    /// Push pending edits and poll right away.
    ///
    /// Returns the session state afterwards, or the current state when no
    /// session is running.
    pub async fn sync_now(&self) -> SessionState {
        let Some(session) = &self.session else {
            return self.state();
        };
        let (reply, response) = oneshot::channel();
        if session.commands.send(SessionCommand::SyncNow(reply)).is_err() {
            return self.state();
        }
        response.await.unwrap_or_else(|_| self.state())
    }

    /// Tear the session down. Results still in flight are discarded.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            let generation = self.generation.fetch_add(1, Ordering::SeqCst);
            if session.commands.send(SessionCommand::Shutdown).is_err() {
                tracing::debug!("Sync session {} had already ended", generation);
            }
            drop(session.task);
            tracing::info!("Stopped sync session {}", generation);
        }
        self.status
            .send_if_modified(|state| transition(state, SessionEvent::Stop));
    }

    /// Observe session state changes
    #[must_use]
    pub fn status(&self) -> watch::Receiver<SessionState> {
        self.status.subscribe()
    }

    /// Current session state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.status.borrow().clone()
    }

    #[must_use]
    pub const fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    #[must_use]
    pub const fn identity(&self) -> Option<&SyncIdentity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub const fn is_sync_enabled(&self) -> bool {
        self.sync_enabled
    }

    /// Wait until the initial pull of the running session has finished
    pub async fn wait_until_started(&self) -> SessionState {
        let mut status = self.status.subscribe();
        let started = match status
            .wait_for(|state| !matches!(state, SessionState::Starting))
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        started
    }

    fn reconcile(&mut self) {
        let should_run = self.identity.is_some() && self.sync_enabled;
        match (should_run, self.session.is_some()) {
            (true, false) => self.start(),
            (false, true) => self.stop(),
            _ => {}
        }
    }

    fn start(&mut self) {
        let Some(identity) = self.identity.clone() else {
            return;
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.status
            .send_if_modified(|state| transition(state, SessionEvent::Start));

        let (commands, command_receiver) = mpsc::unbounded_channel();
        let worker = SessionWorker {
            relay: Arc::clone(&self.relay),
            state: self.state.clone(),
            device_id: self.device_id.clone(),
            identity,
            tuning: self.tuning.clone(),
            guard: GenerationGuard {
                generation,
                current: Arc::clone(&self.generation),
            },
            last_pushed: Arc::clone(&self.last_pushed),
            status: Arc::clone(&self.status),
        };
        let local_edits = self.state.subscribe_local_edits();
        let task = tokio::spawn(worker.run(command_receiver, local_edits));

        self.session = Some(SessionHandle { commands, task });
    }
}

impl<R: Relay> Drop for SyncEngine<R> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn transition(state: &mut SessionState, event: SessionEvent) -> bool {
    let next = state.clone().on(event);
    if next == *state {
        false
    } else {
        *state = next;
        true
    }
}

struct SessionWorker<R: Relay> {
    relay: Arc<R>,
    state: SharedState,
    device_id: DeviceId,
    identity: SyncIdentity,
    tuning: SyncTuning,
    guard: GenerationGuard,
    last_pushed: Arc<AsyncMutex<i64>>,
    status: Arc<watch::Sender<SessionState>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PushReason {
    Debounced,
    /// The relay holds an older snapshot than local state
    Reconcile,
}

async fn next_event(subscription: &mut Option<Subscription>) -> Option<RemoteRecord> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

impl<R: Relay> SessionWorker<R> {
    async fn run(
        self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut local_edits: watch::Receiver<i64>,
    ) {
        local_edits.borrow_and_update();
        let mut debouncer = Debouncer::new(self.tuning.debounce());

        tracing::info!(
            "Starting sync session {} for user {}",
            self.guard.generation,
            self.identity.user_id
        );
        if self.poll(&mut debouncer).await.is_break() {
            self.finish();
            return;
        }

        let mut realtime = self.subscribe().await;
        let period = self.tuning.poll_interval();
        let mut poll = interval_at(Instant::now() + period, period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let flow = tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::SyncNow(reply)) => {
                        let flow = self.sync_now(&mut debouncer).await;
                        if reply.send(self.status.borrow().clone()).is_err() {
                            tracing::debug!("Sync request was abandoned before completion");
                        }
                        flow
                    }
                    Some(SessionCommand::Shutdown) | None => ControlFlow::Break(()),
                },
                changed = local_edits.changed() => match changed {
                    Ok(()) => {
                        let marker = *local_edits.borrow_and_update();
                        tracing::debug!("Local edit {marker}; push in {:?}", debouncer.delay());
                        debouncer.arm();
                        ControlFlow::Continue(())
                    }
                    Err(_) => ControlFlow::Break(()),
                },
                () = debouncer.fired() => self.push(PushReason::Debounced).await,
                _ = poll.tick() => self.poll(&mut debouncer).await,
                event = next_event(&mut realtime) => match event {
                    Some(record) => self.on_remote_event(&record, &mut debouncer).await,
                    None => {
                        tracing::warn!("Realtime channel closed; relying on polling");
                        realtime = None;
                        ControlFlow::Continue(())
                    }
                },
            };

            if flow.is_break() || !self.guard.is_current() {
                break;
            }
        }

        self.finish();
    }

    fn finish(&self) {
        tracing::info!("Sync session {} ended", self.guard.generation);
    }

    async fn subscribe(&self) -> Option<Subscription> {
        match self.relay.subscribe(&self.identity).await {
            Ok(Some(subscription)) => {
                tracing::info!("Realtime channel connected");
                Some(subscription)
            }
            Ok(None) => {
                tracing::debug!(
                    "Relay has no realtime channel; polling every {:?}",
                    self.tuning.poll_interval()
                );
                None
            }
            Err(error) => {
                tracing::warn!("Realtime subscription failed: {error}; relying on polling");
                None
            }
        }
    }

    async fn sync_now(&self, debouncer: &mut Debouncer) -> ControlFlow<()> {
        if debouncer.flush() && self.push(PushReason::Debounced).await.is_break() {
            return ControlFlow::Break(());
        }
        self.poll(debouncer).await
    }

    async fn poll(&self, debouncer: &mut Debouncer) -> ControlFlow<()> {
        let selected = self.relay.select(&self.identity).await;
        if !self.guard.is_current() {
            return ControlFlow::Break(());
        }

        let remote = match selected {
            Ok(remote) => remote,
            Err(error) => return self.record_failure("Poll", error),
        };

        let marker = self.state.marker();
        match remote {
            Some(record) if record.logical_timestamp > marker => {
                self.apply(&record, debouncer).await
            }
            Some(record) if record.logical_timestamp < marker => {
                tracing::debug!(
                    "Local marker {} is newer than relay {}; pushing now",
                    marker,
                    record.logical_timestamp
                );
                debouncer.cancel();
                self.push(PushReason::Reconcile).await
            }
            None if marker > 0 => {
                tracing::debug!("Relay has no document yet; pushing local state");
                debouncer.cancel();
                self.push(PushReason::Reconcile).await
            }
            _ => {
                self.succeeded();
                ControlFlow::Continue(())
            }
        }
    }

    async fn on_remote_event(
        &self,
        record: &RemoteRecord,
        debouncer: &mut Debouncer,
    ) -> ControlFlow<()> {
        if record.device_id == self.device_id.as_str() {
            tracing::debug!("Ignoring echo of our own write {}", record.logical_timestamp);
            return ControlFlow::Continue(());
        }
        if record.logical_timestamp <= self.state.marker() {
            tracing::debug!(
                "Ignoring realtime event {} not newer than local state",
                record.logical_timestamp
            );
            return ControlFlow::Continue(());
        }
        self.apply(record, debouncer).await
    }

    /// Apply a newer remote snapshot. It replaced any pending local edit, so
    /// the pending push is dropped and the snapshot counts as already pushed.
    async fn apply(&self, record: &RemoteRecord, debouncer: &mut Debouncer) -> ControlFlow<()> {
        if !self.guard.is_current() {
            return ControlFlow::Break(());
        }
        match apply_snapshot(&self.state, record).await {
            Ok(outcome) => {
                if outcome.applied {
                    debouncer.cancel();
                    let mut last_pushed = self.last_pushed.lock().await;
                    *last_pushed = (*last_pushed).max(record.logical_timestamp);
                }
                self.succeeded();
            }
            Err(error) => {
                tracing::error!("Failed to store applied snapshot: {error}");
                self.emit(SessionEvent::SyncFailed(error.to_string()));
            }
        }
        ControlFlow::Continue(())
    }

    async fn push(&self, reason: PushReason) -> ControlFlow<()> {
        let mut last_pushed = self.last_pushed.lock().await;
        if !self.guard.is_current() {
            return ControlFlow::Break(());
        }

        let (document, marker) = self.state.snapshot();
        if reason == PushReason::Debounced && marker <= *last_pushed {
            tracing::debug!("Snapshot {marker} already pushed; skipping");
            return ControlFlow::Continue(());
        }

        let snapshot = match serde_json::to_value(&document) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                return self.record_failure("Push", RelayError::InvalidPayload(error.to_string()))
            }
        };
        let write = RelayWrite {
            snapshot,
            logical_timestamp: marker,
            device_id: self.device_id.to_string(),
        };

        let result = self.relay.upsert(&self.identity, &write).await;
        if result.is_ok() {
            *last_pushed = marker;
        }
        if !self.guard.is_current() {
            return ControlFlow::Break(());
        }

        match result {
            Ok(()) => {
                tracing::debug!("Pushed snapshot {marker}");
                self.succeeded();
                ControlFlow::Continue(())
            }
            Err(error) => self.record_failure("Push", error),
        }
    }

    fn record_failure(&self, operation: &str, error: RelayError) -> ControlFlow<()> {
        if error.is_permanent() {
            tracing::warn!("{operation} failed permanently: {error}; continuing local-only");
            self.emit(SessionEvent::RelayUnprovisioned(error.to_string()));
            return ControlFlow::Break(());
        }

        if operation == "Push" {
            tracing::error!("{operation} failed: {error}; retrying on next edit or poll");
        } else {
            tracing::warn!("{operation} failed: {error}; retrying on next poll");
        }
        self.emit(SessionEvent::SyncFailed(format!("{operation} failed: {error}")));
        ControlFlow::Continue(())
    }

    fn succeeded(&self) {
        let event = if *self.status.borrow() == SessionState::Starting {
            tracing::info!("Initial sync completed");
            SessionEvent::InitialSyncCompleted
        } else {
            SessionEvent::SyncSucceeded
        };
        self.emit(event);
    }

    fn emit(&self, event: SessionEvent) {
        self.status.send_if_modified(|state| {
            // A superseded session must not overwrite its successor's state
            self.guard.is_current() && transition(state, event)
        });
    }
}
