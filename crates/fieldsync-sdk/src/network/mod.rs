//! Connectivity monitoring
//!
//! The platform layer (Android/iOS reachability) implements [`ConnectivityProbe`];
//! the SDK only keeps the latest boolean and broadcasts transitions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{FieldSyncError, Result};
use crate::utils::now_millis;

/// Upper bound for a single probe call; a stuck OS API counts as offline
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Connectivity transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatusEvent {
    pub was_online: bool,
    pub is_online: bool,
    pub timestamp: i64,
}

/// OS-level reachability primitive, implemented by the platform layer
#[async_trait]
pub trait ConnectivityProbe: Send + Sync + std::fmt::Debug {
    /// `Err` means the underlying API is unavailable
    async fn is_reachable(&self) -> Result<bool>;
}

/// Probe with a fixed answer, for hosts without a reachability API and for tests
#[derive(Debug)]
pub struct StaticProbe {
    online: AtomicBool,
    available: AtomicBool,
}

impl StaticProbe {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            available: AtomicBool::new(true),
        }
    }

    /// A probe whose API always errors
    pub fn unavailable() -> Self {
        Self {
            online: AtomicBool::new(false),
            available: AtomicBool::new(false),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn is_reachable(&self) -> Result<bool> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(FieldSyncError::Other("connectivity API unavailable".to_string()));
        }
        Ok(self.online.load(Ordering::SeqCst))
    }
}

/// Network monitor
///
/// Holds no history: only the current value and a broadcast of transitions.
#[derive(Debug)]
pub struct NetworkMonitor {
    probe: Arc<dyn ConnectivityProbe>,
    online: AtomicBool,
    status_sender: broadcast::Sender<NetworkStatusEvent>,
}

impl NetworkMonitor {
    /// Starts pessimistic (offline) until the first probe or platform push
    pub fn new(probe: Arc<dyn ConnectivityProbe>) -> Self {
        let (status_sender, _) = broadcast::channel(64);
        Self {
            probe,
            online: AtomicBool::new(false),
            status_sender,
        }
    }

    /// One-shot connectivity query.
    ///
    /// Fail-closed: an erroring or hanging probe reports `false`.
    pub async fn check_connection(&self) -> bool {
        let online = match tokio::time::timeout(PROBE_TIMEOUT, self.probe.is_reachable()).await {
            Ok(Ok(online)) => online,
            Ok(Err(e)) => {
                warn!("connectivity probe failed, treating as offline: {}", e);
                false
            }
            Err(_) => {
                warn!("connectivity probe timed out, treating as offline");
                false
            }
        };
        self.apply(online);
        online
    }

    /// Last known state without touching the probe
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Push a transition from the platform layer
    pub fn set_online(&self, online: bool) {
        self.apply(online);
    }

    fn apply(&self, online: bool) {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online == online {
            return;
        }
        info!("🔌 connectivity changed: {} -> {}", label(was_online), label(online));
        let event = NetworkStatusEvent {
            was_online,
            is_online: online,
            timestamp: now_millis(),
        };
        // no receivers is fine
        let _ = self.status_sender.send(event);
    }

    /// Receiver of every transition from now on
    pub fn subscribe(&self) -> broadcast::Receiver<NetworkStatusEvent> {
        self.status_sender.subscribe()
    }

    /// Invoke `callback(is_online)` on every transition until the subscription is dropped
    pub fn on_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let mut receiver = self.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => callback(event.is_online),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("connectivity subscriber lagged, {} events skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Subscription { handle: Some(handle) }
    }
}

fn label(online: bool) -> &'static str {
    if online {
        "online"
    } else {
        "offline"
    }
}

/// Handle returned by [`NetworkMonitor::on_change`]
#[derive(Debug)]
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
