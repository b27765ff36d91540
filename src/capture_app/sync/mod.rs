//! # Background Sync Service
//!
//! Runs the sync reconciler automatically when connectivity comes back and
//! exposes manual passes and status for the UI.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use report_builder_pro::capture_app::{
//!     ApiClient, Config, ConnectivityMonitor, LocalDatabase, SyncService,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let queue = Arc::new(LocalDatabase::open_default(&config).await?);
//! let store = Arc::new(ApiClient::new(&config)?);
//! let monitor = ConnectivityMonitor::new(true);
//!
//! let mut service = SyncService::from_config(queue, store, monitor, config.app());
//! service.start();
//!
//! let status = service.status().await?;
//! println!("{} report(s) waiting", status.pending);
//! # Ok(())
//! # }
//! ```

pub mod network_monitor;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::capture_app::api::ReportStore;
use crate::capture_app::error::{StorageError, SyncError};
use crate::capture_app::offline::{
    PassOutcome, ReportQueue, SyncPhase, SyncReconciler, SyncReport, SyncTrigger,
};
use crate::shared::config::AppConfig;
use network_monitor::ConnectivityMonitor;

/// Snapshot for status displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub online: bool,
    /// Entries waiting in the local queue
    pub pending: usize,
    pub last_report: Option<SyncReport>,
}

/// Main sync service coordinator
#[derive(Debug)]
pub struct SyncService<Q, S> {
    reconciler: Arc<SyncReconciler<Q, S>>,
    auto_sync: bool,
    background_task: Option<JoinHandle<()>>,
}

impl<Q, S> SyncService<Q, S>
where
    Q: ReportQueue + 'static,
    S: ReportStore + 'static,
{
    pub fn new(reconciler: Arc<SyncReconciler<Q, S>>, auto_sync: bool) -> Self {
        Self {
            reconciler,
            auto_sync,
            background_task: None,
        }
    }

    /// Build the reconciler from configuration
    pub fn from_config(
        queue: Arc<Q>,
        store: Arc<S>,
        monitor: ConnectivityMonitor,
        config: &AppConfig,
    ) -> Self {
        let reconciler = SyncReconciler::new(queue, store, monitor)
            .with_min_interval(Duration::from_secs(config.min_sync_interval_secs));
        Self::new(Arc::new(reconciler), config.auto_sync)
    }

    pub fn reconciler(&self) -> &Arc<SyncReconciler<Q, S>> {
        &self.reconciler
    }

    pub fn is_running(&self) -> bool {
        self.background_task.is_some()
    }

    /// Start reacting to reconnects; returns false if already running
    ///
    /// When already online, the backlog is drained once right away. A pass
    /// throttled by the minimum interval is retried when the window closes.
    /// With `auto_sync` off nothing is spawned and only `sync_now` syncs.
    pub fn start(&mut self) -> bool {
        if self.background_task.is_some() {
            return false;
        }
        if !self.auto_sync {
            info!("Automatic sync disabled");
            return true;
        }

        let reconciler = Arc::clone(&self.reconciler);
        let mut changes = reconciler.monitor().subscribe();
        // Read before spawning so a transition right after start() is seen.
        let mut online = *changes.borrow_and_update();

        let handle = tokio::spawn(async move {
            let mut pending = online.then_some(SyncTrigger::Reconnect);
            let mut retry_at: Option<Instant> = None;

            loop {
                let trigger = match pending.take() {
                    Some(trigger) => trigger,
                    None => tokio::select! {
                        changed = changes.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            let now_online = *changes.borrow_and_update();
                            let reconnected = now_online && !online;
                            online = now_online;
                            if !reconnected {
                                continue;
                            }
                            SyncTrigger::Reconnect
                        }
                        _ = wait_until(retry_at) => SyncTrigger::Scheduled,
                    },
                };
                retry_at = None;

                match reconciler.run(trigger).await {
                    Ok(PassOutcome::Completed(report)) => info!("{}", report.summary()),
                    Ok(PassOutcome::Throttled(left)) => {
                        debug!(?trigger, retry_in = ?left, "Automatic pass throttled");
                        retry_at = Some(Instant::now() + left);
                    }
                    Ok(outcome) => debug!(?trigger, ?outcome, "Automatic pass skipped"),
                    Err(e) => warn!(error = %e, "Automatic sync failed"),
                }
            }
        });

        self.background_task = Some(handle);
        true
    }

    /// Stop the background task
    pub fn stop(&mut self) {
        if let Some(handle) = self.background_task.take() {
            handle.abort();
        }
    }

    /// Run a manual pass now
    pub async fn sync_now(&self) -> Result<PassOutcome, SyncError> {
        self.reconciler.run(SyncTrigger::Manual).await
    }

    /// Get current sync status
    pub async fn status(&self) -> Result<SyncStatus, StorageError> {
        Ok(SyncStatus {
            phase: self.reconciler.phase(),
            online: self.reconciler.monitor().is_online(),
            pending: self.reconciler.queue().count_unsynced().await?,
            last_report: self.reconciler.last_report(),
        })
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl<Q, S> Drop for SyncService<Q, S> {
    fn drop(&mut self) {
        if let Some(handle) = self.background_task.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture_app::offline::testing::{text_payload, ScriptedStore};
    use crate::capture_app::offline::MemoryReportQueue;
    use assert_matches::assert_matches;

    type TestService = SyncService<MemoryReportQueue, ScriptedStore>;

    fn service(auto_sync: bool) -> (TestService, Arc<MemoryReportQueue>, ConnectivityMonitor) {
        let queue = Arc::new(MemoryReportQueue::new());
        let monitor = ConnectivityMonitor::new(false);
        let config = AppConfig::builder()
            .auto_sync(auto_sync)
            .min_sync_interval_secs(0)
            .build()
            .unwrap();
        let service = SyncService::from_config(
            Arc::clone(&queue),
            Arc::new(ScriptedStore::accepting()),
            monitor.clone(),
            &config,
        );
        (service, queue, monitor)
    }

    fn throttled_service(
        online: bool,
        min_interval: Duration,
    ) -> (TestService, Arc<MemoryReportQueue>, Arc<ScriptedStore>, ConnectivityMonitor) {
        let queue = Arc::new(MemoryReportQueue::new());
        let store = Arc::new(ScriptedStore::accepting());
        let monitor = ConnectivityMonitor::new(online);
        let reconciler =
            SyncReconciler::new(Arc::clone(&queue), Arc::clone(&store), monitor.clone())
                .with_min_interval(min_interval);
        (SyncService::new(Arc::new(reconciler), true), queue, store, monitor)
    }

    async fn wait_for_empty(queue: &MemoryReportQueue) {
        for _ in 0..200 {
            if queue.count_unsynced().await.unwrap() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("queue was not drained");
    }

    #[tokio::test]
    async fn test_reconnect_triggers_pass() {
        let (mut service, queue, monitor) = service(true);
        queue.enqueue(text_payload("ok")).await.unwrap();

        assert!(service.start());
        assert!(!service.start());

        // Flips before the background task has been polled even once.
        monitor.set_online(true);
        wait_for_empty(&queue).await;

        let status = service.status().await.unwrap();
        assert!(status.online);
        assert_eq!(status.pending, 0);
        assert_eq!(status.last_report.map(|r| r.synced), Some(1));
        service.stop();
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn test_start_while_online_drains_backlog() {
        let (mut service, queue, store, _monitor) = throttled_service(true, Duration::ZERO);
        queue.enqueue(text_payload("left from last session")).await.unwrap();

        assert!(service.start());
        wait_for_empty(&queue).await;
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn test_throttled_reconnect_is_retried() {
        let (mut service, queue, store, monitor) =
            throttled_service(false, Duration::from_millis(500));
        assert!(service.start());

        queue.enqueue(text_payload("first")).await.unwrap();
        monitor.set_online(true);
        wait_for_empty(&queue).await;

        monitor.set_online(false);
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue(text_payload("second")).await.unwrap();
        monitor.set_online(true);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.count_unsynced().await.unwrap(), 1);

        wait_for_empty(&queue).await;
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn test_auto_sync_disabled() {
        let (mut service, queue, monitor) = service(false);
        queue.enqueue(text_payload("ok")).await.unwrap();

        assert!(service.start());
        assert!(!service.is_running());
        monitor.set_online(true);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.count_unsynced().await.unwrap(), 1);

        let outcome = service.sync_now().await.unwrap();
        assert_matches!(outcome, PassOutcome::Completed(ref r) if r.synced == 1);
        assert_eq!(service.status().await.unwrap().pending, 0);
    }
}
