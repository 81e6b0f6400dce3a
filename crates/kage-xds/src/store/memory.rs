//! In-process store used by tests and single-replica deployments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use kage_core::{Error, Result};

use crate::state::EnvoyState;
use crate::store::{RevertHandle, StateStore};

/// A [`StateStore`] backed by a mutex-guarded map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<String, EnvoyState>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn fetch(&self, node_id: &str) -> Result<EnvoyState> {
        self.records
            .lock()
            .await
            .get(node_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("state for node {node_id}")))
    }

    async fn fetch_all(&self) -> Result<Vec<EnvoyState>> {
        Ok(self.records.lock().await.values().cloned().collect())
    }

    async fn save(&self, state: &EnvoyState) -> Result<RevertHandle> {
        let node_id = state.node_id.clone();
        let prior = self
            .records
            .lock()
            .await
            .insert(node_id.clone(), state.clone());

        let records = Arc::clone(&self.records);
        Ok(RevertHandle::new(move || {
            Box::pin(async move {
                let mut records = records.lock().await;
                match prior {
                    Some(prior) => {
                        records.insert(node_id, prior);
                    }
                    None => {
                        records.remove(&node_id);
                    }
                }
                Ok(())
            })
        }))
    }

    async fn delete(&self, node_id: &str) -> Result<()> {
        self.records.lock().await.remove(node_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kage_core::ErrorKind;

    #[tokio::test]
    async fn test_save_fetch_delete() {
        let store = MemoryStore::new();
        let state = EnvoyState::new("n1");

        store.save(&state).await.unwrap();
        assert_eq!(store.fetch("n1").await.unwrap(), state);

        store.delete("n1").await.unwrap();
        let err = store.fetch("n1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_absent_is_ok() {
        let store = MemoryStore::new();
        assert!(store.delete("missing").await.is_ok());
    }

    #[tokio::test]
    async fn test_revert_restores_prior() {
        let store = MemoryStore::new();
        let mut first = EnvoyState::new("n1");
        first.clusters.push(crate::state::ClusterSpec {
            name: "c1".to_string(),
        });
        store.save(&first).await.unwrap();

        let second = EnvoyState::new("n1");
        let handle = store.save(&second).await.unwrap();
        assert_eq!(store.fetch("n1").await.unwrap(), second);

        handle.revert().await.unwrap();
        assert_eq!(store.fetch("n1").await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_revert_of_first_save_removes_record() {
        let store = MemoryStore::new();
        let handle = store.save(&EnvoyState::new("n1")).await.unwrap();

        handle.revert().await.unwrap();
        assert!(store.fetch("n1").await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_handle_commits() {
        let store = MemoryStore::new();
        let state = EnvoyState::new("n1");
        drop(store.save(&state).await.unwrap());
        assert_eq!(store.fetch("n1").await.unwrap(), state);
    }
}
