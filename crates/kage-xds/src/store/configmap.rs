//! ConfigMap-backed store.
//!
//! Each node's state is one ConfigMap in the control plane namespace,
//! named after the node id, labelled so replicas can list all snapshot
//! records in one call. The payload is the JSON-encoded [`EnvoyState`]
//! under a single binary entry keyed by the node id.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::ByteString;
use kube::api::{DeleteParams, ListParams, ObjectMeta, Patch, PatchParams};
use kube::Api;
use tracing::warn;

use kage_core::{names, Error, Result};

use crate::state::EnvoyState;
use crate::store::{RevertHandle, StateStore};

const FIELD_MANAGER: &str = "kage";

/// A [`StateStore`] persisting to labelled ConfigMaps.
#[derive(Clone)]
pub struct ConfigMapStore {
    api: Api<ConfigMap>,
}

impl ConfigMapStore {
    /// Store records in the given namespace.
    pub fn new(client: kube::Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }

    fn selector() -> String {
        format!("{}={}", names::RESOURCE_LABEL, names::SNAPSHOT_RESOURCE)
    }

    fn to_config_map(state: &EnvoyState) -> Result<ConfigMap> {
        let payload = serde_json::to_vec(state)
            .map_err(|e| Error::internal_from("encode envoy state", e))?;
        let mut binary_data = BTreeMap::new();
        binary_data.insert(state.node_id.clone(), ByteString(payload));

        Ok(ConfigMap {
            metadata: ObjectMeta {
                name: Some(state.node_id.clone()),
                labels: Some(BTreeMap::from([(
                    names::RESOURCE_LABEL.to_string(),
                    names::SNAPSHOT_RESOURCE.to_string(),
                )])),
                ..Default::default()
            },
            binary_data: Some(binary_data),
            ..Default::default()
        })
    }

    fn from_config_map(cm: &ConfigMap) -> Result<EnvoyState> {
        let name = cm.metadata.name.as_deref().unwrap_or_default();
        let entry = cm
            .binary_data
            .as_ref()
            .and_then(|data| data.get(name))
            .ok_or_else(|| Error::NotFound(format!("snapshot entry in config map {name}")))?;
        serde_json::from_slice(&entry.0)
            .map_err(|e| Error::internal_from(format!("decode envoy state {name}"), e))
    }

    async fn apply(&self, state: &EnvoyState) -> Result<()> {
        let cm = Self::to_config_map(state)?;
        self.api
            .patch(
                &state.node_id,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&cm),
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, node_id: &str) -> Result<()> {
        match self.api.delete(node_id, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(err) => match Error::from(err) {
                Error::NotFound(_) => Ok(()),
                other => Err(other),
            },
        }
    }
}

#[async_trait]
impl StateStore for ConfigMapStore {
    async fn fetch(&self, node_id: &str) -> Result<EnvoyState> {
        let cm = self
            .api
            .get_opt(node_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("state for node {node_id}")))?;
        Self::from_config_map(&cm)
    }

    async fn fetch_all(&self) -> Result<Vec<EnvoyState>> {
        let params = ListParams::default().labels(&Self::selector());
        let list = self.api.list(&params).await?;

        // A corrupt record must not block reload of the healthy ones.
        let mut states = Vec::with_capacity(list.items.len());
        for cm in &list.items {
            match Self::from_config_map(cm) {
                Ok(state) => states.push(state),
                Err(err) => warn!(
                    name = cm.metadata.name.as_deref().unwrap_or_default(),
                    error = %err,
                    "skipping undecodable snapshot config map"
                ),
            }
        }
        Ok(states)
    }

    async fn save(&self, state: &EnvoyState) -> Result<RevertHandle> {
        let prior = match self.api.get_opt(&state.node_id).await? {
            Some(cm) => Some(Self::from_config_map(&cm)?),
            None => None,
        };
        self.apply(state).await?;

        let store = self.clone();
        let node_id = state.node_id.clone();
        Ok(RevertHandle::new(move || {
            Box::pin(async move {
                match prior {
                    Some(prior) => store.apply(&prior).await,
                    None => store.remove(&node_id).await,
                }
            })
        }))
    }

    async fn delete(&self, node_id: &str) -> Result<()> {
        self.remove(node_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_map_roundtrip() {
        let mut state = EnvoyState::new("kage-ns1-nginx");
        state.clusters.push(crate::state::ClusterSpec {
            name: "nginx-kage-service".to_string(),
        });

        let cm = ConfigMapStore::to_config_map(&state).unwrap();
        assert_eq!(cm.metadata.name.as_deref(), Some("kage-ns1-nginx"));
        assert_eq!(
            cm.metadata
                .labels
                .as_ref()
                .unwrap()
                .get(names::RESOURCE_LABEL)
                .map(String::as_str),
            Some(names::SNAPSHOT_RESOURCE)
        );

        let back = ConfigMapStore::from_config_map(&cm).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_config_map_without_entry_is_not_found() {
        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some("kage-ns1-nginx".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = ConfigMapStore::from_config_map(&cm).unwrap_err();
        assert_eq!(err.kind(), kage_core::ErrorKind::NotFound);
    }

    #[test]
    fn test_selector() {
        assert_eq!(ConfigMapStore::selector(), "kage.cloud/resource=snapshot");
    }
}
