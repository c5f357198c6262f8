//! Resolves replication status for a batch of keys.
//!
//! Fresh cache entries are served directly. Misses are checked against the
//! backend through the bounded scheduler, and their results are written back
//! to the cache. Once the backend reports that the consistency check does not
//! exist, every key resolves to `Unknown` without any network traffic.

use std::{collections::HashSet, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    models::{
        status::{ResolvedStatus, StatusMap, StatusRecord},
        view::ViewContext,
    },
    services::{
        capability::CapabilityProbe,
        consistency_client::{ConsistencyCheck, SyncError, SyncResult},
        scheduler::{DEFAULT_CONCURRENCY, Task, TaskFailure, run_bounded, task},
        status_cache::{STATUS_TTL, StatusCache},
    },
};

/// Owns the status cache and capability flag for one logical session.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct StatusSynchronizer {
    cache: Arc<Mutex<StatusCache>>,
    probe: Arc<CapabilityProbe>,
    client: Arc<dyn ConsistencyCheck>,
    view: Arc<Mutex<ViewContext>>,
    concurrency: usize,
}

impl StatusSynchronizer {
    pub fn new(client: Arc<dyn ConsistencyCheck>) -> Self {
        Self::with_limits(client, DEFAULT_CONCURRENCY, STATUS_TTL)
    }

    pub fn with_limits(client: Arc<dyn ConsistencyCheck>, concurrency: usize, ttl: Duration) -> Self {
        Self {
            cache: Arc::new(Mutex::new(StatusCache::new(ttl))),
            probe: Arc::new(CapabilityProbe::new()),
            client,
            view: Arc::new(Mutex::new(ViewContext::default())),
            concurrency: concurrency.max(1),
        }
    }

    pub fn capability(&self) -> &CapabilityProbe {
        &self.probe
    }

    /// Resolve the status of every key in `keys` as seen from `current_zone`.
    ///
    /// Every requested key gets an entry. Per-key failures resolve to
    /// `Unknown`; only a lost session fails the whole call.
    pub async fn resolve(&self, keys: &[String], current_zone: &str) -> SyncResult<StatusMap> {
        let mut statuses = StatusMap::with_capacity(keys.len());

        if !self.probe.is_available() {
            for key in keys {
                statuses.insert(key.clone(), ResolvedStatus::UNKNOWN);
            }
            return Ok(statuses);
        }

        let mut misses = Vec::new();
        {
            let cache = self.cache.lock().await;
            let mut seen = HashSet::new();
            for key in keys {
                if !seen.insert(key.as_str()) {
                    continue;
                }
                match cache.get(key).filter(|record| record.zone == current_zone) {
                    Some(record) => {
                        statuses.insert(key.clone(), record.status());
                    }
                    None => misses.push(key.clone()),
                }
            }
        }

        debug!(
            "resolving {} keys in zone {} ({} cached, {} to check)",
            keys.len(),
            current_zone,
            statuses.len(),
            misses.len()
        );

        let tasks: Vec<Task<ResolvedStatus, SyncError>> = misses
            .iter()
            .map(|key| {
                let this = self.clone();
                let key = key.clone();
                let zone = current_zone.to_string();
                task(move || async move { this.check_one(&key, &zone).await })
            })
            .collect();

        let outcomes = run_bounded(tasks, self.concurrency).await;

        let mut session_lost = false;
        for (key, outcome) in misses.into_iter().zip(outcomes) {
            let status = match outcome {
                Ok(status) => status,
                Err(TaskFailure::Failed(SyncError::SessionLost)) => {
                    session_lost = true;
                    ResolvedStatus::UNKNOWN
                }
                Err(TaskFailure::Failed(err)) => {
                    debug!("status for {} unavailable this pass: {}", key, err);
                    ResolvedStatus::UNKNOWN
                }
                Err(TaskFailure::Aborted(reason)) => {
                    warn!("status check for {} aborted: {}", key, reason);
                    ResolvedStatus::UNKNOWN
                }
            };
            statuses.insert(key, status);
        }

        if session_lost {
            return Err(SyncError::SessionLost);
        }
        Ok(statuses)
    }

    /// Check one key and cache the outcome.
    ///
    /// A key whose check is still pending when the capability disappears
    /// resolves to `Unknown` and is not cached.
    async fn check_one(&self, key: &str, zone: &str) -> SyncResult<ResolvedStatus> {
        if !self.probe.is_available() {
            return Ok(ResolvedStatus::UNKNOWN);
        }

        match self.client.check(key, zone).await {
            Ok(report) => {
                if !self.probe.is_available() {
                    return Ok(ResolvedStatus::UNKNOWN);
                }
                let record = StatusRecord::from_report(key, zone, report);
                let status = record.status();
                self.cache.lock().await.put(key, record);
                Ok(status)
            }
            Err(SyncError::CapabilityNotFound) => {
                self.probe.mark_unavailable();
                Ok(ResolvedStatus::UNKNOWN)
            }
            Err(err) => Err(err),
        }
    }

    /// Resolve the keys of the current view against its zone.
    pub async fn resolve_view(&self) -> SyncResult<StatusMap> {
        let view = self.view().await;
        self.resolve(&view.keys, &view.zone).await
    }

    /// Replace the current view. Clears the cache and returns `true` when
    /// the new view crosses a navigation boundary.
    pub async fn set_view(&self, next: ViewContext) -> bool {
        let mut view = self.view.lock().await;
        let cleared = view.materially_differs(&next);
        if cleared {
            self.clear_cache().await;
            debug!("view changed to zone={} prefix={:?}; cache cleared", next.zone, next.prefix);
        }
        *view = next;
        cleared
    }

    pub async fn view(&self) -> ViewContext {
        self.view.lock().await.clone()
    }

    pub async fn clear_cache(&self) {
        let mut cache = self.cache.lock().await;
        if !cache.is_empty() {
            debug!("dropping {} cached statuses", cache.len());
        }
        cache.clear();
    }

    /// Fresh cached record for `key`, without any network traffic.
    pub async fn cached(&self, key: &str) -> Option<Arc<StatusRecord>> {
        self.cache.lock().await.get(key)
    }

    pub async fn invalidate(&self, key: &str) {
        self.cache.lock().await.invalidate(key);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{
        consistency::{ConsistencyReport, VersionBrief, VersionKind, ZoneReport},
        status::ReplicationState,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted backend: per-key reports or errors, counting calls.
    #[derive(Default)]
    pub(crate) struct FakeBackend {
        pub calls: AtomicUsize,
        pub reports: StdMutex<HashMap<String, SyncResult<ConsistencyReport>>>,
    }

    impl FakeBackend {
        pub fn with(entries: Vec<(&str, SyncResult<ConsistencyReport>)>) -> Arc<Self> {
            let backend = Self::default();
            {
                let mut reports = backend.reports.lock().unwrap();
                for (key, result) in entries {
                    reports.insert(key.to_string(), result);
                }
            }
            Arc::new(backend)
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ConsistencyCheck for FakeBackend {
        async fn check(&self, key: &str, _current_zone: &str) -> SyncResult<ConsistencyReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.reports
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .unwrap_or_else(|| Err(SyncError::Transport("no script".into())))
        }
    }

    pub(crate) fn report(zone: &str, state: ReplicationState, kind: VersionKind) -> ConsistencyReport {
        ConsistencyReport {
            per_zone: vec![ZoneReport {
                zone: zone.to_string(),
                state,
                latest: Some(VersionBrief {
                    kind,
                    version_id: Some("v1".into()),
                    etag: None,
                    last_modified: None,
                    size: Some(3),
                    is_latest: true,
                }),
                error: None,
            }],
            ..Default::default()
        }
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_within_ttl() {
        let backend = FakeBackend::with(vec![(
            "a.txt",
            Ok(report("z1", ReplicationState::Latest, VersionKind::Version)),
        )]);
        let sync = StatusSynchronizer::new(backend.clone());

        let first = sync.resolve(&keys(&["a.txt"]), "z1").await.unwrap();
        assert_eq!(
            first["a.txt"],
            ResolvedStatus {
                state: ReplicationState::Latest,
                is_delete_marker: false
            }
        );

        tokio::time::advance(Duration::from_secs(29)).await;
        let second = sync.resolve(&keys(&["a.txt"]), "z1").await.unwrap();
        assert_eq!(second, first);
        assert_eq!(backend.calls(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        sync.resolve(&keys(&["a.txt"]), "z1").await.unwrap();
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_delete_marker_on_latest() {
        let backend = FakeBackend::with(vec![(
            "gone.txt",
            Ok(report("z1", ReplicationState::Latest, VersionKind::DeleteMarker)),
        )]);
        let sync = StatusSynchronizer::new(backend);

        let out = sync.resolve(&keys(&["gone.txt"]), "z1").await.unwrap();
        let status = out["gone.txt"];
        assert_eq!(status.state, ReplicationState::Latest);
        assert!(status.is_delete_marker);
        assert_eq!(status.badge().label(), "Deleted");
    }

    #[tokio::test]
    async fn test_capability_not_found_downgrades() {
        let backend = FakeBackend::with(vec![
            ("a", Err(SyncError::CapabilityNotFound)),
            ("b", Ok(report("z1", ReplicationState::Latest, VersionKind::Version))),
            ("c", Ok(report("z1", ReplicationState::Latest, VersionKind::Version))),
        ]);
        let sync = StatusSynchronizer::with_limits(backend.clone(), 1, STATUS_TTL);

        let out = sync.resolve(&keys(&["a", "b", "c"]), "z1").await.unwrap();
        assert!(!sync.capability().is_available());
        assert_eq!(backend.calls(), 1);
        assert!(out.values().all(|s| *s == ResolvedStatus::UNKNOWN));

        let later = sync.resolve(&keys(&["b", "d"]), "z1").await.unwrap();
        assert_eq!(later.len(), 2);
        assert!(later.values().all(|s| *s == ResolvedStatus::UNKNOWN));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_checks_after_downgrade_are_not_cached() {
        let mut entries = vec![("a", Err(SyncError::CapabilityNotFound))];
        for key in ["b", "c", "d", "e"] {
            entries.push((key, Ok(report("z1", ReplicationState::Latest, VersionKind::Version))));
        }
        let backend = FakeBackend::with(entries);
        let sync = StatusSynchronizer::new(backend.clone());

        let out = sync
            .resolve(&keys(&["a", "b", "c", "d", "e", "f", "g", "h"]), "z1")
            .await
            .unwrap();
        assert_eq!(out.len(), 8);
        assert!(out.values().all(|s| *s == ResolvedStatus::UNKNOWN));
        // The first five were admitted together; the rest skipped the call.
        assert_eq!(backend.calls(), DEFAULT_CONCURRENCY);
        assert!(!sync.capability().is_available());
        for key in ["b", "c", "d", "e"] {
            assert!(sync.cached(key).await.is_none(), "{key} was cached");
        }
    }

    #[tokio::test]
    async fn test_cached_status_is_scoped_to_its_zone() {
        let mut two_zones = report("z1", ReplicationState::Latest, VersionKind::Version);
        two_zones
            .per_zone
            .extend(report("z2", ReplicationState::Outdated, VersionKind::Version).per_zone);
        let backend = FakeBackend::with(vec![("a", Ok(two_zones))]);
        let sync = StatusSynchronizer::new(backend.clone());

        let z1 = sync.resolve(&keys(&["a"]), "z1").await.unwrap();
        assert_eq!(z1["a"].state, ReplicationState::Latest);

        let z2 = sync.resolve(&keys(&["a"]), "z2").await.unwrap();
        assert_eq!(z2["a"].state, ReplicationState::Outdated);
        assert_eq!(backend.calls(), 2);

        // The z2 answer replaced the z1 one.
        sync.resolve(&keys(&["a"]), "z1").await.unwrap();
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_resolve_runs_on_a_spawned_task() {
        let backend = FakeBackend::with(vec![(
            "a",
            Ok(report("z1", ReplicationState::Latest, VersionKind::Version)),
        )]);
        let sync = StatusSynchronizer::new(backend);

        let handle = tokio::spawn(async move { sync.resolve(&keys(&["a", "b"]), "z1").await });
        let out = handle.await.unwrap().unwrap();
        assert_eq!(out["a"].state, ReplicationState::Latest);
        assert_eq!(out["b"], ResolvedStatus::UNKNOWN);
    }

    #[tokio::test]
    async fn test_transport_error_is_not_pinned() {
        let backend = FakeBackend::with(vec![
            ("a", Err(SyncError::Transport("timeout".into()))),
            ("b", Ok(report("z1", ReplicationState::Outdated, VersionKind::Version))),
        ]);
        let sync = StatusSynchronizer::new(backend.clone());

        let out = sync.resolve(&keys(&["a", "b"]), "z1").await.unwrap();
        assert_eq!(out["a"], ResolvedStatus::UNKNOWN);
        assert_eq!(out["b"].state, ReplicationState::Outdated);
        assert!(sync.capability().is_available());

        backend.reports.lock().unwrap().insert(
            "a".into(),
            Ok(report("z1", ReplicationState::Latest, VersionKind::Version)),
        );
        let retry = sync.resolve(&keys(&["a", "b"]), "z1").await.unwrap();
        assert_eq!(retry["a"].state, ReplicationState::Latest);
        // "b" came from the cache.
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_every_key_gets_an_entry() {
        let backend = FakeBackend::with(vec![
            ("k1", Ok(report("z1", ReplicationState::Latest, VersionKind::Version))),
            ("k2", Ok(report("z2", ReplicationState::Latest, VersionKind::Version))),
        ]);
        let sync = StatusSynchronizer::new(backend.clone());

        let requested = keys(&["k1", "k2", "k3", "k1"]);
        let out = sync.resolve(&requested, "z1").await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out["k1"].state, ReplicationState::Latest);
        // No entry for z1 in the report.
        assert_eq!(out["k2"], ResolvedStatus::UNKNOWN);
        assert_eq!(out["k3"], ResolvedStatus::UNKNOWN);
        assert_eq!(backend.calls(), 3);

        assert!(sync.resolve(&[], "z1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_loss_fails_the_call() {
        let backend = FakeBackend::with(vec![
            ("a", Ok(report("z1", ReplicationState::Latest, VersionKind::Version))),
            ("b", Err(SyncError::SessionLost)),
        ]);
        let sync = StatusSynchronizer::new(backend);

        assert_eq!(
            sync.resolve(&keys(&["a", "b"]), "z1").await,
            Err(SyncError::SessionLost)
        );
    }

    #[tokio::test]
    async fn test_view_change_clears_cache() {
        let backend = FakeBackend::with(vec![(
            "docs/a",
            Ok(report("z1", ReplicationState::Latest, VersionKind::Version)),
        )]);
        let sync = StatusSynchronizer::new(backend.clone());
        let view = ViewContext {
            zone: "z1".into(),
            prefix: "docs/".into(),
            keys: keys(&["docs/a"]),
        };

        assert!(sync.set_view(view.clone()).await);
        sync.resolve_view().await.unwrap();
        assert!(!sync.set_view(view.clone()).await);
        sync.resolve_view().await.unwrap();
        assert_eq!(backend.calls(), 1);

        let moved = ViewContext {
            zone: "z2".into(),
            ..view
        };
        assert!(sync.set_view(moved).await);
        sync.resolve_view().await.unwrap();
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_single_key() {
        let backend = FakeBackend::with(vec![
            ("a", Ok(report("z1", ReplicationState::Latest, VersionKind::Version))),
            ("b", Ok(report("z1", ReplicationState::Latest, VersionKind::Version))),
        ]);
        let sync = StatusSynchronizer::new(backend.clone());

        sync.resolve(&keys(&["a", "b"]), "z1").await.unwrap();
        sync.invalidate("a").await;
        sync.resolve(&keys(&["a", "b"]), "z1").await.unwrap();
        assert_eq!(backend.calls(), 3);
    }
}
