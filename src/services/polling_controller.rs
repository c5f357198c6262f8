//! Optional auto-refresh loop for the visible listing.
//!
//! While active, a spawned task re-validates the session, clears the status
//! cache and resolves the current view at a fixed interval. The latest
//! result is published on a `watch` channel for the UI layer.

use serde::Serialize;
use std::{
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    models::status::StatusMap,
    services::{
        consistency_client::{SyncError, SyncResult},
        session::SessionProvider,
        status_synchronizer::StatusSynchronizer,
    },
};

/// Delay between two refresh cycles.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10_000);

/// What the UI renders from the polling loop.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct PollSnapshot {
    pub active: bool,
    /// Number of completed cycles since start-up.
    pub cycle: u64,
    /// Set when a cycle stopped polling because the session could not be
    /// refreshed. Cleared on the next `enable`.
    pub session_lost: bool,
    pub statuses: StatusMap,
}

/// A live loop. Dropping the handle without cancelling would leave the loop
/// running, so every path that takes it out of the controller cancels it.
struct PollHandle {
    generation: Uuid,
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

struct Inner {
    synchronizer: StatusSynchronizer,
    sessions: Arc<dyn SessionProvider>,
    interval: Duration,
    handle: Mutex<Option<PollHandle>>,
    snapshot: watch::Sender<PollSnapshot>,
}

#[derive(Clone)]
pub struct PollingController {
    inner: Arc<Inner>,
}

impl PollingController {
    pub fn new(synchronizer: StatusSynchronizer, sessions: Arc<dyn SessionProvider>) -> Self {
        Self::with_interval(synchronizer, sessions, POLL_INTERVAL)
    }

    pub fn with_interval(
        synchronizer: StatusSynchronizer,
        sessions: Arc<dyn SessionProvider>,
        interval: Duration,
    ) -> Self {
        let (snapshot, _) = watch::channel(PollSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                synchronizer,
                sessions,
                interval,
                handle: Mutex::new(None),
                snapshot,
            }),
        }
    }

    pub fn synchronizer(&self) -> &StatusSynchronizer {
        &self.inner.synchronizer
    }

    pub fn snapshot(&self) -> PollSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub async fn is_active(&self) -> bool {
        self.inner.handle.lock().await.is_some()
    }

    /// Start polling. The first cycle runs immediately. Returns `false` if
    /// polling was already active.
    pub async fn enable(&self) -> bool {
        let mut handle = self.inner.handle.lock().await;
        if handle.is_some() {
            return false;
        }

        let generation = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(Arc::downgrade(&self.inner), generation, cancel.clone()));
        *handle = Some(PollHandle {
            generation,
            cancel,
            _task: task,
        });

        self.inner.snapshot.send_modify(|snap| {
            snap.active = true;
            snap.session_lost = false;
        });
        info!("status polling enabled (loop {})", generation);
        true
    }

    /// Stop polling. A cycle already in flight is abandoned; its network
    /// checks still finish and populate the cache.
    pub async fn disable(&self) -> bool {
        let stopped = self.inner.release(None).await;
        if stopped {
            info!("status polling disabled");
        }
        stopped
    }

    /// Stop polling, drop cached statuses and forget the session.
    pub async fn logout(&self) {
        self.inner.release(None).await;
        self.inner.synchronizer.clear_cache().await;
        self.inner.sessions.logout().await;
        self.inner.snapshot.send_modify(|snap| {
            snap.statuses.clear();
        });
        info!("logged out; status polling stopped");
    }

    /// Hook for the upload/delete workflow, called once a mutation finished
    /// and before the next synchronization.
    ///
    /// Long transfers can outlive the access token, so the session is
    /// refreshed first. The cache is then cleared so the next pass observes
    /// the mutation.
    pub async fn after_mutation(&self) -> SyncResult<()> {
        if self.inner.sessions.refresh_session().await.is_none() {
            self.inner.session_lost(None).await;
            return Err(SyncError::SessionLost);
        }
        self.inner.synchronizer.clear_cache().await;
        debug!("cache cleared after mutation");
        Ok(())
    }
}

impl Inner {
    /// Take the live handle and cancel it. With `Some(generation)`, only a
    /// handle of that generation is released.
    async fn release(&self, generation: Option<Uuid>) -> bool {
        let mut handle = self.handle.lock().await;
        let matches = match (handle.as_ref(), generation) {
            (Some(live), Some(wanted)) => live.generation == wanted,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !matches {
            return false;
        }

        if let Some(live) = handle.take() {
            live.cancel.cancel();
        }
        self.snapshot.send_modify(|snap| snap.active = false);
        true
    }

    /// Stop polling and flag the session as lost. A loop reporting under a
    /// generation that is no longer live leaves the snapshot alone.
    async fn session_lost(&self, generation: Option<Uuid>) {
        let released = self.release(generation).await;
        if generation.is_some() && !released {
            debug!("stale polling loop reported session loss; ignored");
            return;
        }
        self.snapshot.send_modify(|snap| {
            snap.active = false;
            snap.session_lost = true;
        });
        warn!("session lost; status polling stopped");
    }

    /// One refresh pass over the current view.
    ///
    /// Returns `Ok(None)` when the pass failed for a reason that should not
    /// stop polling.
    async fn run_cycle(&self) -> SyncResult<Option<StatusMap>> {
        if self.sessions.refresh_session().await.is_none() {
            return Err(SyncError::SessionLost);
        }

        self.synchronizer.clear_cache().await;
        match self.synchronizer.resolve_view().await {
            Ok(statuses) => Ok(Some(statuses)),
            Err(SyncError::SessionLost) => Err(SyncError::SessionLost),
            Err(err) => {
                warn!("status refresh cycle failed: {}", err);
                Ok(None)
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(live) = self.handle.get_mut().take() {
            live.cancel.cancel();
        }
    }
}

/// The loop only holds the controller weakly between cycles, so dropping
/// the last `PollingController` ends it.
async fn run_loop(inner: Weak<Inner>, generation: Uuid, cancel: CancellationToken) {
    let Some(interval) = inner.upgrade().map(|inner| inner.interval) else {
        return;
    };
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = inner.run_cycle() => outcome,
        };

        match outcome {
            Ok(Some(statuses)) => {
                inner.snapshot.send_modify(|snap| {
                    snap.cycle += 1;
                    snap.statuses = statuses;
                });
            }
            Ok(None) => {
                inner.snapshot.send_modify(|snap| snap.cycle += 1);
            }
            Err(_) => {
                inner.session_lost(Some(generation)).await;
                break;
            }
        }
    }

    debug!("status polling loop {} exited", generation);
}
