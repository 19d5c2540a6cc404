//! Shared session
//!
//! Every remote call goes through one [`SessionProvider`], so an expired
//! token is refreshed once no matter how many requests noticed it.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{ErrorClass, FieldSyncError, Result};
use crate::storage::kv::{keys, KvStore};

/// Credentials used by the HTTP layer
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Current bearer token, `None` when logged out
    async fn access_token(&self) -> Result<Option<String>>;

    /// Obtain a fresh token after `stale` was refused by the server.
    ///
    /// Callers racing on the same stale token share one refresh.
    async fn reauthenticate(&self, stale: Option<&str>) -> Result<String>;

    async fn clear(&self) -> Result<()>;
}

/// Performs the actual login against the auth backend
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self) -> Result<String>;
}

/// Token cached in memory and in the KV store
pub struct SessionManager {
    kv: Arc<KvStore>,
    authenticator: Arc<dyn Authenticator>,
    // `None` inside means "not loaded yet"
    token: Mutex<Option<Option<String>>>,
}

impl SessionManager {
    pub fn new(kv: Arc<KvStore>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            kv,
            authenticator,
            token: Mutex::new(None),
        }
    }

    /// Store a token obtained elsewhere (interactive login screen)
    pub async fn set_token(&self, token: &str) -> Result<()> {
        let mut guard = self.token.lock().await;
        self.kv.set(keys::SESSION_TOKEN, &token).await?;
        *guard = Some(Some(token.to_string()));
        Ok(())
    }

    async fn load(&self, slot: &mut Option<Option<String>>) -> Result<Option<String>> {
        if let Some(cached) = slot {
            return Ok(cached.clone());
        }
        let stored: Option<String> = self.kv.get(keys::SESSION_TOKEN).await?;
        *slot = Some(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl SessionProvider for SessionManager {
    async fn access_token(&self) -> Result<Option<String>> {
        let mut guard = self.token.lock().await;
        self.load(&mut guard).await
    }

    async fn reauthenticate(&self, stale: Option<&str>) -> Result<String> {
        let mut guard = self.token.lock().await;
        let current = self.load(&mut guard).await?;
        if let Some(current) = current {
            if Some(current.as_str()) != stale {
                // someone refreshed while we were waiting on the lock
                return Ok(current);
            }
        }

        info!("🔑 re-authenticating");
        let fresh = match self.authenticator.login().await {
            Ok(token) => token,
            Err(e) if e.class() == ErrorClass::Rejected => {
                warn!("re-authentication refused: {}", e);
                return Err(FieldSyncError::Auth(format!("login refused: {}", e)));
            }
            Err(e) => return Err(e),
        };
        self.kv.set(keys::SESSION_TOKEN, &fresh).await?;
        *guard = Some(Some(fresh.clone()));
        Ok(fresh)
    }

    async fn clear(&self) -> Result<()> {
        let mut guard = self.token.lock().await;
        self.kv.delete(keys::SESSION_TOKEN).await?;
        *guard = Some(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingAuthenticator {
        logins: AtomicUsize,
        refuse: bool,
    }

    #[async_trait]
    impl Authenticator for CountingAuthenticator {
        async fn login(&self) -> Result<String> {
            let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.refuse {
                return Err(FieldSyncError::from_status(403, "bad password"));
            }
            Ok(format!("token-{}", n))
        }
    }

    async fn manager(dir: &TempDir, auth: Arc<CountingAuthenticator>) -> SessionManager {
        SessionManager::new(Arc::new(KvStore::new(dir.path()).await.unwrap()), auth)
    }

    #[tokio::test]
    async fn concurrent_reauth_is_single_flight() {
        let dir = TempDir::new().unwrap();
        let auth = Arc::new(CountingAuthenticator::default());
        let session = Arc::new(manager(&dir, auth.clone()).await);
        session.set_token("expired").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                session.reauthenticate(Some("expired")).await
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), "token-1");
        }
        assert_eq!(auth.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn token_survives_restart_and_clear() {
        let dir = TempDir::new().unwrap();
        let auth = Arc::new(CountingAuthenticator::default());
        {
            let session = manager(&dir, auth.clone()).await;
            assert_eq!(session.access_token().await.unwrap(), None);
            session.reauthenticate(None).await.unwrap();
        }
        let session = manager(&dir, auth.clone()).await;
        assert_eq!(session.access_token().await.unwrap().as_deref(), Some("token-1"));

        session.clear().await.unwrap();
        assert_eq!(session.access_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn refused_login_is_auth_error() {
        let dir = TempDir::new().unwrap();
        let auth = Arc::new(CountingAuthenticator {
            refuse: true,
            ..Default::default()
        });
        let session = manager(&dir, auth).await;
        let err = session.reauthenticate(None).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Auth);
    }
}
