//! Credential Store
//!
//! Keyed persistence of credential bundles. The relay only needs get/set by
//! user key; `MemoryCredentialStore` keeps bundles for the process lifetime.
//! A database or shared cache can back the same trait without touching the
//! guard or the refresher.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{user_fingerprint, CredentialBundle};
use crate::common::AppResult;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the bundle for a user key (`None` when nothing is stored).
    async fn get(&self, user_key: &str) -> AppResult<Option<CredentialBundle>>;

    /// Store a bundle, replacing any previous one (last write wins).
    async fn set(&self, user_key: &str, bundle: CredentialBundle) -> AppResult<()>;

    /// Remove a bundle. Returns whether one existed.
    async fn delete(&self, user_key: &str) -> AppResult<bool>;
}

/// In-memory store
#[derive(Default)]
pub struct MemoryCredentialStore {
    bundles: RwLock<HashMap<String, CredentialBundle>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.bundles.read().await.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, user_key: &str) -> AppResult<Option<CredentialBundle>> {
        Ok(self.bundles.read().await.get(user_key).cloned())
    }

    async fn set(&self, user_key: &str, bundle: CredentialBundle) -> AppResult<()> {
        debug!("Storing credential bundle for {}", user_fingerprint(user_key));
        self.bundles.write().await.insert(user_key.to_string(), bundle);
        Ok(())
    }

    async fn delete(&self, user_key: &str) -> AppResult<bool> {
        Ok(self.bundles.write().await.remove(user_key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_bundle;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = MemoryCredentialStore::new();
        assert!(store.get("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_replaces_previous_bundle() {
        let store = MemoryCredentialStore::new();
        store.set("alice", test_bundle(None)).await.unwrap();

        let mut newer = test_bundle(None);
        newer.access_token = "ya29.new".to_string();
        store.set("alice", newer).await.unwrap();

        let stored = store.get("alice").await.unwrap().unwrap();
        assert_eq!(stored.access_token, "ya29.new");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryCredentialStore::new();
        store.set("alice", test_bundle(None)).await.unwrap();
        assert!(store.delete("alice").await.unwrap());
        assert!(!store.delete("alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_writes_leave_a_whole_bundle() {
        let store = Arc::new(MemoryCredentialStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let mut bundle = test_bundle(None);
                bundle.access_token = format!("token-{}", i);
                store.set("shared", bundle).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = store.get("shared").await.unwrap().unwrap();
        assert!(stored.access_token.starts_with("token-"));
        assert_eq!(stored.client_id, "client-1");
    }
}
