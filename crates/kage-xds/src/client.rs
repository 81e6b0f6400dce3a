//! The snapshot client: the single writer of Envoy state.
//!
//! Every mutation flows through [`SnapshotClient::set`], which merges the
//! incoming record into the prior one, persists it, rebuilds the cache
//! snapshot, and only then commits to memory. When the snapshot build
//! fails after the durable save, the save is reverted so persisted
//! state, in-memory state, and the cache never diverge.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use kage_cache::{NodeHash, SnapshotCache};
use kage_core::{BatchError, Error, Result, StateVersion};

use crate::factory;
use crate::state::EnvoyState;
use crate::store::StateStore;

/// Serialization point for all Envoy state mutation.
pub struct SnapshotClient {
    states: RwLock<HashMap<String, EnvoyState>>,
    cache: Arc<SnapshotCache>,
    store: Arc<dyn StateStore>,
}

impl SnapshotClient {
    /// Create a client over the given cache and durable store.
    pub fn new(cache: Arc<SnapshotCache>, store: Arc<dyn StateStore>) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            cache,
            store,
        }
    }

    /// The snapshot cache the discovery services read from.
    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Merge `state` into the node's record and install it everywhere.
    ///
    /// Empty sub-slices inherit the prior record, duplicates are dropped,
    /// and a fresh version is assigned. On any failure the node's prior
    /// record stays in force in the store, in memory, and in the cache.
    pub async fn set(&self, mut state: EnvoyState) -> Result<StateVersion> {
        if state.node_id.is_empty() {
            return Err(Error::invalid("envoy state is missing its node id"));
        }

        let mut states = self.states.write().await;

        state.dedup();
        if let Some(prior) = states.get(&state.node_id) {
            state.inherit_empty(prior);
        }
        state.version = StateVersion::new();

        let revert = self.store.save(&state).await?;
        let snapshot = match factory::snapshot(&state) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                if let Err(revert_err) = revert.revert().await {
                    error!(
                        node_id = %state.node_id,
                        error = %revert_err,
                        "failed to revert durable state after snapshot build failure"
                    );
                }
                return Err(err);
            }
        };

        self.cache
            .set_snapshot(NodeHash::from_id(&state.node_id), snapshot);
        let version = state.version;
        info!(node_id = %state.node_id, %version, "installed envoy state");
        states.insert(state.node_id.clone(), state);
        Ok(version)
    }

    /// The current record for one node.
    pub async fn get(&self, node_id: &str) -> Result<EnvoyState> {
        self.states
            .read()
            .await
            .get(node_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("state for node {node_id}")))
    }

    /// All current records.
    pub async fn list(&self) -> Vec<EnvoyState> {
        self.states.read().await.values().cloned().collect()
    }

    /// Remove a node's record from memory, cache, and the store.
    pub async fn delete(&self, node_id: &str) -> Result<()> {
        let mut states = self.states.write().await;
        states.remove(node_id);
        self.cache.clear_snapshot(NodeHash::from_id(node_id));
        self.store.delete(node_id).await?;
        info!(node_id, "removed envoy state");
        Ok(())
    }

    /// Drop a node's record from memory and cache only, leaving the
    /// durable store untouched. Used when another replica already
    /// removed the durable record.
    pub async fn evict(&self, node_id: &str) {
        let mut states = self.states.write().await;
        if states.remove(node_id).is_some() {
            self.cache.clear_snapshot(NodeHash::from_id(node_id));
            debug!(node_id, "evicted envoy state");
        }
    }

    /// Install every persisted record, keeping versions as persisted.
    ///
    /// Called once at startup. Returns the number of nodes installed;
    /// fails when any record cannot be turned into a snapshot.
    pub async fn load(&self) -> Result<usize> {
        let persisted = self.store.fetch_all().await?;
        let mut states = self.states.write().await;

        let mut batch = BatchError::new();
        let mut loaded = 0;
        for state in persisted {
            match self.install(&mut states, state) {
                Ok(()) => loaded += 1,
                Err(err) => batch.push(err),
            }
        }
        batch.into_result()?;
        info!(nodes = loaded, "loaded persisted envoy state");
        Ok(loaded)
    }

    /// Fold newer persisted records into memory and cache.
    ///
    /// Another replica committing a mutation shows up here through the
    /// store. Records whose persisted version is not strictly newer than
    /// the in-memory one are left alone, so a replica never steps on its
    /// own just-committed write. Returns the number of nodes refreshed.
    pub async fn reload(&self) -> Result<usize> {
        let persisted = self.store.fetch_all().await?;
        let mut states = self.states.write().await;

        let mut refreshed = 0;
        for state in persisted {
            let stale = match states.get(&state.node_id) {
                Some(current) => state.version.newer_than(&current.version),
                None => true,
            };
            if !stale {
                continue;
            }
            match self.install(&mut states, state) {
                Ok(()) => refreshed += 1,
                Err(err) => warn!(error = %err, "skipping unbuildable persisted state"),
            }
        }
        if refreshed > 0 {
            debug!(nodes = refreshed, "reloaded persisted envoy state");
        }
        Ok(refreshed)
    }

    /// Build and install a snapshot without re-versioning or persisting.
    fn install(&self, states: &mut HashMap<String, EnvoyState>, state: EnvoyState) -> Result<()> {
        let snapshot = factory::snapshot(&state)?;
        self.cache
            .set_snapshot(NodeHash::from_id(&state.node_id), snapshot);
        states.insert(state.node_id.clone(), state);
        Ok(())
    }
}
