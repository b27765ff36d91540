//! # Network Monitor
//!
//! Online/offline signal for the capture client. Whoever observes the
//! platform's connectivity calls `set_online`. Without such a signal,
//! `spawn_probe` polls a reachability probe instead.
//!
//! Listeners registered with `on_change` run synchronously inside
//! `set_online`, only when the state actually flips. Async consumers use
//! `subscribe`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::capture_app::api::ReachabilityProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    Offline,
}

impl From<bool> for NetworkStatus {
    fn from(online: bool) -> Self {
        if online {
            NetworkStatus::Online
        } else {
            NetworkStatus::Offline
        }
    }
}

/// Handle returned by `on_change`, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(NetworkStatus) + Send + Sync>;

struct Inner {
    sender: watch::Sender<bool>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

/// Shared connectivity state; clones observe the same state
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<Inner>,
}

impl fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (sender, _) = watch::channel(initially_online);
        Self {
            inner: Arc::new(Inner {
                sender,
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.inner.sender.borrow()
    }

    pub fn status(&self) -> NetworkStatus {
        self.is_online().into()
    }

    /// Record the current connectivity; returns whether it changed
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.inner.sender.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });

        if changed {
            let status = NetworkStatus::from(online);
            info!(?status, "Connectivity changed");

            // Snapshot so listeners may register or unregister from inside a callback.
            let listeners: Vec<Listener> = self
                .inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();
            for listener in listeners {
                listener(status);
            }
        }
        changed
    }

    /// Register a callback run on every transition
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(NetworkStatus) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Unregister a callback; returns false if it was not registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Receiver that wakes on every transition
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.sender.subscribe()
    }

    /// Poll `probe` every `interval` and feed the result into `set_online`
    pub fn spawn_probe<P>(&self, probe: Arc<P>, interval: Duration) -> JoinHandle<()>
    where
        P: ReachabilityProbe + 'static,
    {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reachable = probe.is_reachable().await;
                debug!(reachable, "Reachability probe");
                monitor.set_online(reachable);
            }
        })
    }
}
