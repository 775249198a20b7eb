use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::info;

use crate::session_store::{session_key, Error, SessionStore};

const CLEANUP_INTERVAL: usize = 1000;

#[derive(Debug)]
pub struct Backend {
    sessions: Arc<RwLock<HashMap<String, (String, Instant)>>>,
    operations: Arc<AtomicUsize>,
}

impl Backend {
    pub fn new() -> Self {
        info!("Using in-memory session store");
        Backend {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            operations: Arc::new(AtomicUsize::new(0)),
        }
    }

    async fn evict_expired(&self) {
        let count = self.operations.fetch_add(1, Ordering::Relaxed);
        if count % CLEANUP_INTERVAL != 0 {
            return;
        }

        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        sessions.retain(|_, &mut (_, expiry)| expiry > now);
    }
}

#[async_trait]
impl SessionStore for Backend {
    async fn store_session(
        &self,
        session_id: &str,
        username: &str,
        expires_in: u64,
    ) -> Result<(), Error> {
        self.evict_expired().await;

        let expiry = Instant::now() + Duration::from_secs(expires_in);
        let mut sessions = self.sessions.write().await;
        sessions.insert(session_key(session_id), (username.to_string(), expiry));
        Ok(())
    }

    async fn lookup_session(&self, session_id: &str) -> Result<Option<String>, Error> {
        self.evict_expired().await;

        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(&session_key(session_id))
            .filter(|(_, expiry)| *expiry > Instant::now())
            .map(|(username, _)| username.clone()))
    }
}

#[cfg(test)]
mod tests {
    use tokio::time;

    use super::*;

    #[tokio::test]
    async fn test_store_and_lookup() {
        let store = Backend::new();

        store.store_session("abc", "alice", 1).await.unwrap();
        assert_eq!(
            store.lookup_session("abc").await,
            Ok(Some("alice".to_string()))
        );
        assert_eq!(store.lookup_session("other").await, Ok(None));

        time::sleep(Duration::from_millis(1050)).await;
        assert_eq!(store.lookup_session("abc").await, Ok(None));
    }

    #[tokio::test]
    async fn test_store_refreshes_expiry() {
        let store = Backend::new();

        store.store_session("abc", "alice", 1).await.unwrap();
        store.store_session("abc", "alice", 100).await.unwrap();

        time::sleep(Duration::from_millis(1050)).await;
        assert_eq!(
            store.lookup_session("abc").await,
            Ok(Some("alice".to_string()))
        );
    }

    #[tokio::test]
    async fn test_expired_sessions_are_evicted() {
        let store = Backend::new();

        for i in 0..500 {
            store
                .store_session(&format!("short_{i}"), "bob", 1)
                .await
                .unwrap();
        }
        store.store_session("long", "alice", 100).await.unwrap();

        time::sleep(Duration::from_millis(1100)).await;

        for i in 0..500 {
            let _ = store.lookup_session(&format!("missing_{i}")).await;
        }

        assert_eq!(store.sessions.read().await.len(), 1);
        assert_eq!(
            store.lookup_session("long").await,
            Ok(Some("alice".to_string()))
        );
    }
}
