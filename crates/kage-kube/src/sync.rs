//! Cross-replica snapshot synchronization.
//!
//! Every replica persists Envoy state as labeled ConfigMaps. Watching
//! those ConfigMaps lets the other replicas fold in writes they did not
//! make themselves: an applied snapshot triggers a reload, which only
//! installs records strictly newer than what is already in memory, and a
//! deleted snapshot evicts the node locally without touching the store.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use tracing::{debug, info};

use kage_core::{names, Result};
use kage_xds::SnapshotClient;

use crate::informer::{EventHandler, WatcherSpec};

/// Folds snapshot ConfigMap events into the local snapshot client.
pub struct SnapshotSync {
    snapshots: Arc<SnapshotClient>,
}

impl SnapshotSync {
    /// Create the sync handler.
    pub fn new(snapshots: Arc<SnapshotClient>) -> Self {
        Self { snapshots }
    }

    /// The watcher spec for this handler: snapshot ConfigMaps only.
    #[must_use]
    pub fn spec(self: Arc<Self>) -> WatcherSpec<ConfigMap> {
        WatcherSpec::new()
            .filter(is_snapshot_config_map)
            .handler(self)
    }
}

/// True when the ConfigMap carries the snapshot resource label.
#[must_use]
pub fn is_snapshot_config_map(cm: &ConfigMap) -> bool {
    cm.labels().get(names::RESOURCE_LABEL).map(String::as_str)
        == Some(names::SNAPSHOT_RESOURCE)
}

#[async_trait]
impl EventHandler<ConfigMap> for SnapshotSync {
    async fn on_initial(&self, _objects: &[ConfigMap]) -> Result<()> {
        // Startup already loaded the store; the initial list adds nothing.
        Ok(())
    }

    async fn on_apply(&self, cm: &ConfigMap) -> Result<()> {
        let refreshed = self.snapshots.reload().await?;
        if refreshed > 0 {
            info!(config_map = %cm.name_any(), refreshed, "folded in peer snapshot write");
        } else {
            debug!(config_map = %cm.name_any(), "snapshot write already current");
        }
        Ok(())
    }

    async fn on_delete(&self, cm: &ConfigMap) -> Result<()> {
        // The ConfigMap name is the node id.
        let node_id = cm.name_any();
        self.snapshots.evict(&node_id).await;
        info!(%node_id, "evicted node after peer snapshot deletion");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    use kage_cache::SnapshotCache;
    use kage_xds::state::{ClusterSpec, EnvoyState};
    use kage_xds::store::MemoryStore;

    fn labeled(name: &str, labels: BTreeMap<String, String>) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_snapshot_label_filter() {
        let snapshot = labeled(
            "kage-ns1-nginx",
            BTreeMap::from([(
                names::RESOURCE_LABEL.to_string(),
                names::SNAPSHOT_RESOURCE.to_string(),
            )]),
        );
        assert!(is_snapshot_config_map(&snapshot));

        let other = labeled("plain", BTreeMap::from([("app".to_string(), "x".to_string())]));
        assert!(!is_snapshot_config_map(&other));
    }

    #[tokio::test]
    async fn test_delete_evicts_locally() {
        let cache = Arc::new(SnapshotCache::new());
        let store = Arc::new(MemoryStore::new());
        let client = Arc::new(SnapshotClient::new(cache, store));

        let mut state = EnvoyState::new("kage-ns1-nginx");
        state.clusters = vec![ClusterSpec {
            name: "nginx-kage-service".to_string(),
        }];
        client.set(state).await.unwrap();

        let sync = SnapshotSync::new(client.clone());
        sync.on_delete(&labeled("kage-ns1-nginx", BTreeMap::new()))
            .await
            .unwrap();

        assert!(client.get("kage-ns1-nginx").await.is_err());
    }
}
