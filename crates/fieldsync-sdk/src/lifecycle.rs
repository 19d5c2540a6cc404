//! App lifecycle
//!
//! The host app forwards foreground/background and login/logout events; the
//! manager fans them out to every registered hook.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;

/// Reacts to app lifecycle events. Every method defaults to a no-op.
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    async fn on_foreground(&self) -> Result<()> {
        Ok(())
    }

    async fn on_background(&self) -> Result<()> {
        Ok(())
    }

    async fn on_login(&self) -> Result<()> {
        Ok(())
    }

    async fn on_logout(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Foreground,
    Background,
    Login,
    Logout,
}

pub struct LifecycleManager {
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    pub fn register_hook(&mut self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.push(hook);
        info!("✅ lifecycle hook registered ({} total)", self.hooks.len());
    }

    pub async fn notify_foreground(&self) -> Result<()> {
        self.notify(LifecycleEvent::Foreground).await
    }

    pub async fn notify_background(&self) -> Result<()> {
        self.notify(LifecycleEvent::Background).await
    }

    pub async fn notify_login(&self) -> Result<()> {
        self.notify(LifecycleEvent::Login).await
    }

    pub async fn notify_logout(&self) -> Result<()> {
        self.notify(LifecycleEvent::Logout).await
    }

    /// Run every hook in registration order.
    ///
    /// A failing hook does not stop the others; the first error is returned
    /// once all of them ran.
    pub async fn notify(&self, event: LifecycleEvent) -> Result<()> {
        info!("🔄 lifecycle: {:?}", event);
        let mut first_error = None;
        let mut failures = 0usize;

        for (index, hook) in self.hooks.iter().enumerate() {
            let result = match event {
                LifecycleEvent::Foreground => hook.on_foreground().await,
                LifecycleEvent::Background => hook.on_background().await,
                LifecycleEvent::Login => hook.on_login().await,
                LifecycleEvent::Logout => hook.on_logout().await,
            };
            if let Err(e) = result {
                warn!("⚠️ hook #{} failed on {:?}: {}", index, event, e);
                failures += 1;
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => {
                warn!("⚠️ {} hooks failed on {:?}, all were attempted", failures, event);
                Err(e)
            }
            None => Ok(()),
        }
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

// registered by the SDK itself
mod sync_hook;
pub use sync_hook::SyncLifecycleHook;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldSyncError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl LifecycleHook for Counting {
        async fn on_foreground(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FieldSyncError::Other("hook failed".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn failing_hook_does_not_stop_others() {
        let failing = Arc::new(Counting { calls: AtomicUsize::new(0), fail: true });
        let healthy = Arc::new(Counting { calls: AtomicUsize::new(0), fail: false });
        let mut manager = LifecycleManager::new();
        manager.register_hook(failing.clone());
        manager.register_hook(healthy.clone());

        assert!(manager.notify_foreground().await.is_err());
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);

        // default no-op
        assert!(manager.notify_background().await.is_ok());
    }
}
