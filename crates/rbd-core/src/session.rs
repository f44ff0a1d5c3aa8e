//! In-memory session tokens with a sliding expiry window.
//!
//! Lookups share a read lock; issue, refresh, revoke and the sweep take the
//! write lock. Expiry uses `tokio::time::Instant`, so tests can pause and
//! advance the clock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use rbd_types::models::UserId;

use crate::sweeper::Sweeper;

/// 30 days.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const DEFAULT_SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lifetime granted on issue and on every refresh.
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_SESSION_TTL,
            sweep_interval: DEFAULT_SESSION_SWEEP_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SessionEntry {
    user_id: UserId,
    expires_at: Instant,
}

impl SessionEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Cheap to clone; all clones share the same token table.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    tokens: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config,
                tokens: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Creates a new token for `user_id`.
    pub async fn issue(&self, user_id: UserId) -> String {
        let token = generate_token();
        let entry = SessionEntry {
            user_id,
            expires_at: Instant::now() + self.inner.config.ttl,
        };
        self.inner.tokens.write().await.insert(token.clone(), entry);
        debug!("Issued session for {}", user_id);
        token
    }

    /// Returns the token's user if it exists and has not expired.
    pub async fn validate(&self, token: &str) -> Option<UserId> {
        let tokens = self.inner.tokens.read().await;
        let entry = tokens.get(token)?;
        if entry.is_expired(Instant::now()) {
            return None;
        }
        Some(entry.user_id)
    }

    /// Pushes the expiry a full TTL past now. An expired token is dropped
    /// and cannot be refreshed.
    pub async fn refresh(&self, token: &str) -> bool {
        let mut tokens = self.inner.tokens.write().await;
        let now = Instant::now();

        match tokens.get_mut(token) {
            Some(entry) if !entry.is_expired(now) => {
                entry.expires_at = now + self.inner.config.ttl;
                true
            }
            Some(_) => {
                tokens.remove(token);
                false
            }
            None => false,
        }
    }

    /// Returns whether the token existed.
    pub async fn revoke(&self, token: &str) -> bool {
        self.inner.tokens.write().await.remove(token).is_some()
    }

    /// Drops every expired token in one pass.
    pub async fn sweep_expired(&self) -> usize {
        let mut tokens = self.inner.tokens.write().await;
        let now = Instant::now();
        let before = tokens.len();
        tokens.retain(|_, entry| !entry.is_expired(now));
        before - tokens.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.tokens.read().await.len()
    }

    /// Starts the periodic sweep on the current runtime.
    pub fn start_sweeper(&self) -> Sweeper {
        let store = self.clone();
        Sweeper::spawn("session", self.inner.config.sweep_interval, move || {
            let store = store.clone();
            async move {
                let removed = store.sweep_expired().await;
                if removed > 0 {
                    info!("Session sweep: removed {} expired tokens", removed);
                }
            }
        })
    }
}

fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn store(ttl_secs: u64) -> SessionStore {
        SessionStore::new(SessionConfig {
            ttl: Duration::from_secs(ttl_secs),
            sweep_interval: Duration::from_secs(10),
        })
    }

    #[tokio::test]
    async fn issue_then_validate() {
        let sessions = store(60);
        let user = Uuid::new_v4();

        let token = sessions.issue(user).await;
        assert_eq!(token.len(), 43);
        assert_eq!(sessions.validate(&token).await, Some(user));
        assert_eq!(sessions.validate("nope").await, None);
    }

    #[tokio::test]
    async fn tokens_are_unique() {
        let sessions = store(60);
        let user = Uuid::new_v4();
        let t1 = sessions.issue(user).await;
        let t2 = sessions.issue(user).await;
        assert_ne!(t1, t2);
        assert_eq!(sessions.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn token_expires_after_ttl() {
        let sessions = store(60);
        let token = sessions.issue(Uuid::new_v4()).await;

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(sessions.validate(&token).await, None);
        assert!(!sessions.refresh(&token).await);
        assert_eq!(sessions.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_slides_expiry() {
        let sessions = store(60);
        let user = Uuid::new_v4();
        let token = sessions.issue(user).await;

        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(sessions.refresh(&token).await);

        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(sessions.validate(&token).await, Some(user));
    }

    #[tokio::test]
    async fn revoke_removes_token() {
        let sessions = store(60);
        let token = sessions.issue(Uuid::new_v4()).await;

        assert!(sessions.revoke(&token).await);
        assert!(!sessions.revoke(&token).await);
        assert_eq!(sessions.validate(&token).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_expired() {
        let sessions = store(60);
        let old = sessions.issue(Uuid::new_v4()).await;
        tokio::time::advance(Duration::from_secs(30)).await;
        let fresh = sessions.issue(Uuid::new_v4()).await;
        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(sessions.sweep_expired().await, 1);
        assert_eq!(sessions.validate(&old).await, None);
        assert!(sessions.validate(&fresh).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweeper_evicts_and_stops() {
        let sessions = store(5);
        sessions.issue(Uuid::new_v4()).await;

        let sweeper = sessions.start_sweeper();
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(sessions.len().await, 0);

        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn concurrent_lookups_share_the_table() {
        let sessions = store(60);
        let user = Uuid::new_v4();
        let token = sessions.issue(user).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let sessions = sessions.clone();
            let token = token.clone();
            handles.push(tokio::spawn(async move { sessions.validate(&token).await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Some(user));
        }
    }
}
