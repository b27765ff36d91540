//! # Sync Reconciler
//!
//! Drains the unsynced backlog to the Remote Report Store.
//!
//! A pass works on the `list_unsynced` snapshot taken when it starts and
//! submits entries one at a time. A confirmed entry is marked synced, then
//! removed. A failed entry stays queued, unchanged, for a later pass, and the
//! pass moves on. Only a 401 ends a pass early.
//!
//! ```text
//!            run()                     pass finished / failed
//!   Idle ──────────────▶ Syncing ─────────────────────────────▶ Idle
//!    ▲                      │ run() while Syncing
//!    └──────────────────────┘ returns AlreadySyncing
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::ReportQueue;
use crate::capture_app::api::ReportStore;
use crate::capture_app::error::{RemoteError, SyncError};
use crate::capture_app::sync::network_monitor::ConnectivityMonitor;

/// Reconciler state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Syncing,
}

/// What asked for a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// The user asked; never throttled
    Manual,
    /// Connectivity came back
    Reconnect,
    /// Retry after a throttled automatic pass
    Scheduled,
}

impl SyncTrigger {
    pub fn is_automatic(&self) -> bool {
        !matches!(self, SyncTrigger::Manual)
    }
}

/// One entry that could not be delivered during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub local_id: String,
    pub reason: String,
    /// False when the server refused the payload itself
    pub retryable: bool,
}

/// Counts of one completed pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    /// Single user-facing summary of the pass
    pub fn summary(&self) -> String {
        if self.failed == 0 {
            format!("Synced {} report(s).", self.synced)
        } else {
            format!("Synced {} report(s). {} failed.", self.synced, self.failed)
        }
    }

    fn record_failure(&mut self, local_id: &str, reason: String, retryable: bool) {
        self.failed += 1;
        self.failures.push(SyncFailure {
            local_id: local_id.to_string(),
            reason,
            retryable,
        });
    }
}

/// Result of asking for a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Completed(SyncReport),
    /// Another pass is in flight; nothing was submitted
    AlreadySyncing,
    Offline,
    NothingPending,
    /// Automatic pass inside the minimum interval; holds the time left
    Throttled(Duration),
}

#[derive(Debug)]
struct ReconcilerState {
    phase: SyncPhase,
    /// Start of the last pass that had entries to submit
    last_pass: Option<Instant>,
    last_report: Option<SyncReport>,
}

/// Puts the reconciler back to `Idle` when a pass ends, however it ends
struct PassGuard<'a> {
    state: &'a Mutex<ReconcilerState>,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).phase = SyncPhase::Idle;
    }
}

/// Sync reconciler over a queue and a store
#[derive(Debug)]
pub struct SyncReconciler<Q, S> {
    queue: Arc<Q>,
    store: Arc<S>,
    monitor: ConnectivityMonitor,
    min_interval: Duration,
    state: Mutex<ReconcilerState>,
}

impl<Q, S> SyncReconciler<Q, S>
where
    Q: ReportQueue,
    S: ReportStore,
{
    pub fn new(queue: Arc<Q>, store: Arc<S>, monitor: ConnectivityMonitor) -> Self {
        Self {
            queue,
            store,
            monitor,
            min_interval: Duration::ZERO,
            state: Mutex::new(ReconcilerState {
                phase: SyncPhase::Idle,
                last_pass: None,
                last_report: None,
            }),
        }
    }

    /// Minimum time between automatic passes
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn queue(&self) -> &Arc<Q> {
        &self.queue
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    fn state(&self) -> MutexGuard<'_, ReconcilerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> SyncPhase {
        self.state().phase
    }

    /// Report of the most recent pass that visited entries
    pub fn last_report(&self) -> Option<SyncReport> {
        self.state().last_report.clone()
    }

    /// Move `Idle -> Syncing`, or say why not
    fn begin(&self, trigger: SyncTrigger) -> Result<PassGuard<'_>, PassOutcome> {
        let mut state = self.state();
        if state.phase == SyncPhase::Syncing {
            return Err(PassOutcome::AlreadySyncing);
        }
        if trigger.is_automatic() {
            if let Some(last) = state.last_pass {
                let remaining = self.min_interval.saturating_sub(last.elapsed());
                if !remaining.is_zero() {
                    return Err(PassOutcome::Throttled(remaining));
                }
            }
        }
        state.phase = SyncPhase::Syncing;
        Ok(PassGuard { state: &self.state })
    }

    /// Run one pass over the current backlog
    pub async fn run(&self, trigger: SyncTrigger) -> Result<PassOutcome, SyncError> {
        if !self.monitor.is_online() {
            return Ok(PassOutcome::Offline);
        }
        let _guard = match self.begin(trigger) {
            Ok(guard) => guard,
            Err(outcome) => {
                debug!(?trigger, ?outcome, "Sync pass not started");
                return Ok(outcome);
            }
        };

        let snapshot = self.queue.list_unsynced().await?;
        if snapshot.is_empty() {
            return Ok(PassOutcome::NothingPending);
        }
        self.state().last_pass = Some(Instant::now());
        info!(?trigger, pending = snapshot.len(), "Sync pass started");

        let mut report = SyncReport::default();
        for entry in &snapshot {
            let server_id = match self.store.submit_report(&entry.payload()).await {
                Ok(server_id) => server_id,
                Err(RemoteError::Unauthorized) => {
                    warn!(local_id = %entry.local_id, "Sync stopped: not authorized");
                    self.state().last_report = Some(report);
                    return Err(SyncError::Unauthorized);
                }
                Err(e) => {
                    warn!(local_id = %entry.local_id, error = %e, "Sync failed for entry");
                    report.record_failure(&entry.local_id, e.to_string(), e.is_retryable());
                    continue;
                }
            };

            if let Err(e) = self.queue.mark_synced(&entry.local_id, &server_id).await {
                error!(local_id = %entry.local_id, error = %e, "Failed to mark entry synced");
                report.record_failure(&entry.local_id, e.to_string(), true);
                continue;
            }
            if let Err(e) = self.queue.remove(&entry.local_id).await {
                // Already marked synced, so it will not be resubmitted.
                warn!(local_id = %entry.local_id, error = %e, "Synced entry could not be removed");
            }
            debug!(local_id = %entry.local_id, %server_id, "Entry synced");
            report.synced += 1;
        }

        info!(synced = report.synced, failed = report.failed, "Sync pass finished");
        self.state().last_report = Some(report.clone());
        Ok(PassOutcome::Completed(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture_app::error::StorageError;
    use crate::capture_app::offline::testing::{text_payload, Reply, ScriptedStore};
    use crate::capture_app::offline::MemoryReportQueue;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    async fn reconciler_with(
        entries: usize,
        store: ScriptedStore,
    ) -> Arc<SyncReconciler<MemoryReportQueue, ScriptedStore>> {
        let queue = Arc::new(MemoryReportQueue::new());
        for i in 0..entries {
            queue.enqueue(text_payload(&format!("entry {}", i))).await.unwrap();
        }
        Arc::new(SyncReconciler::new(
            queue,
            Arc::new(store),
            ConnectivityMonitor::new(true),
        ))
    }

    #[tokio::test]
    async fn test_pass_removes_synced_entries() {
        let reconciler = reconciler_with(2, ScriptedStore::accepting()).await;

        let outcome = reconciler.run(SyncTrigger::Manual).await.unwrap();
        assert_matches!(outcome, PassOutcome::Completed(ref r) if r.synced == 2 && r.failed == 0);
        assert!(reconciler.queue().list_all().await.unwrap().is_empty());
        assert_eq!(reconciler.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_failed_entry() {
        let store = ScriptedStore::scripted([
            Reply::Accept("srv-1".to_string()),
            Reply::Reject(503, "Database not ready yet".to_string()),
            Reply::Accept("srv-3".to_string()),
        ]);
        let reconciler = reconciler_with(3, store).await;
        let before = reconciler.queue().list_unsynced().await.unwrap();

        let outcome = reconciler.run(SyncTrigger::Manual).await.unwrap();
        let PassOutcome::Completed(report) = outcome else {
            panic!("expected a completed pass");
        };
        assert_eq!(report.synced, 2);
        assert_eq!(report.failed, 1);
        assert!(report.failures[0].retryable);
        assert_eq!(report.summary(), "Synced 2 report(s). 1 failed.");

        let remaining = reconciler.queue().list_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0], before[1]);
        assert!(!remaining[0].synced);
    }

    #[tokio::test]
    async fn test_terminal_rejection_is_flagged() {
        let store =
            ScriptedStore::with_fallback(Reply::Reject(400, "Template ID is required".to_string()));
        let reconciler = reconciler_with(1, store).await;

        let outcome = reconciler.run(SyncTrigger::Manual).await.unwrap();
        assert_matches!(outcome, PassOutcome::Completed(ref r) if !r.failures[0].retryable);
        assert_eq!(reconciler.queue().count_unsynced().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_run_does_not_double_submit() {
        let store = ScriptedStore::accepting().gated();
        let reconciler = reconciler_with(2, store).await;
        let store = Arc::clone(&reconciler.store);

        let first = {
            let reconciler = Arc::clone(&reconciler);
            tokio::spawn(async move { reconciler.run(SyncTrigger::Manual).await })
        };
        while store.calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(reconciler.phase(), SyncPhase::Syncing);

        let second = reconciler.run(SyncTrigger::Manual).await.unwrap();
        assert_eq!(second, PassOutcome::AlreadySyncing);

        store.release(2);
        let first = first.await.unwrap().unwrap();
        assert_matches!(first, PassOutcome::Completed(ref r) if r.synced == 2);
        assert_eq!(store.calls(), 2);
        assert_eq!(reconciler.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn test_offline_and_empty_passes() {
        let reconciler = reconciler_with(0, ScriptedStore::accepting()).await;
        let outcome = reconciler.run(SyncTrigger::Manual).await.unwrap();
        assert_eq!(outcome, PassOutcome::NothingPending);

        reconciler.monitor().set_online(false);
        let outcome = reconciler.run(SyncTrigger::Manual).await.unwrap();
        assert_eq!(outcome, PassOutcome::Offline);
    }

    #[tokio::test]
    async fn test_unauthorized_abandons_pass() {
        let store =
            ScriptedStore::scripted([Reply::Accept("srv-1".to_string()), Reply::Unauthorized]);
        let reconciler = reconciler_with(3, store).await;

        let err = reconciler.run(SyncTrigger::Manual).await.unwrap_err();
        assert_matches!(err, SyncError::Unauthorized);
        assert_eq!(reconciler.store.calls(), 2);
        assert_eq!(reconciler.queue().count_unsynced().await.unwrap(), 2);
        assert_eq!(reconciler.last_report().map(|r| r.synced), Some(1));
        assert_eq!(reconciler.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn test_automatic_passes_are_throttled() {
        let queue = Arc::new(MemoryReportQueue::new());
        queue.enqueue(text_payload("a")).await.unwrap();
        let reconciler = SyncReconciler::new(
            Arc::clone(&queue),
            Arc::new(ScriptedStore::accepting()),
            ConnectivityMonitor::new(true),
        )
        .with_min_interval(Duration::from_secs(60));

        let first = reconciler.run(SyncTrigger::Reconnect).await.unwrap();
        assert_matches!(first, PassOutcome::Completed(_));

        queue.enqueue(text_payload("b")).await.unwrap();
        let throttled = reconciler.run(SyncTrigger::Reconnect).await.unwrap();
        assert_matches!(throttled, PassOutcome::Throttled(left) if left <= Duration::from_secs(60));
        let manual = reconciler.run(SyncTrigger::Manual).await.unwrap();
        assert_matches!(manual, PassOutcome::Completed(_));
    }

    #[tokio::test]
    async fn test_empty_pass_does_not_start_throttle_window() {
        let queue = Arc::new(MemoryReportQueue::new());
        let reconciler = SyncReconciler::new(
            Arc::clone(&queue),
            Arc::new(ScriptedStore::accepting()),
            ConnectivityMonitor::new(true),
        )
        .with_min_interval(Duration::from_secs(60));

        let empty = reconciler.run(SyncTrigger::Reconnect).await.unwrap();
        assert_eq!(empty, PassOutcome::NothingPending);

        queue.enqueue(text_payload("captured after")).await.unwrap();
        let outcome = reconciler.run(SyncTrigger::Reconnect).await.unwrap();
        assert_matches!(outcome, PassOutcome::Completed(ref r) if r.synced == 1);
        assert_eq!(queue.count_unsynced().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_storage_error_releases_guard() {
        let reconciler = reconciler_with(1, ScriptedStore::accepting()).await;
        reconciler.queue().close().await;

        let err = reconciler.run(SyncTrigger::Manual).await.unwrap_err();
        assert_matches!(err, SyncError::Storage(StorageError::Closed));
        assert_eq!(reconciler.phase(), SyncPhase::Idle);
    }
}
