//! Connection registry: membership set of live streaming sessions.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Opaque identity of one streaming connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(format!("conn-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry of live connection ids. Bookkeeping only: never iterated to send.
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashSet<ConnectionId>>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Returns false if the id was already present.
    pub async fn register(&self, id: ConnectionId) -> bool {
        self.inner.write().await.insert(id)
    }

    /// Returns false if the id was not present (never registered or already removed).
    pub async fn unregister(&self, id: &ConnectionId) -> bool {
        self.inner.write().await.remove(id)
    }

    pub async fn contains(&self, id: &ConnectionId) -> bool {
        self.inner.read().await.contains(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_unregister_twice_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        assert!(registry.register(id.clone()).await);
        assert!(registry.contains(&id).await);
        assert!(registry.unregister(&id).await);
        assert!(!registry.unregister(&id).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn ids_are_distinct() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("conn-"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_register_and_unregister() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..64 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let id = ConnectionId::new();
                registry.register(id.clone()).await;
                tokio::task::yield_now().await;
                registry.unregister(&id).await
            }));
        }
        for h in handles {
            assert!(h.await.unwrap());
        }
        assert_eq!(registry.len().await, 0);
    }
}
