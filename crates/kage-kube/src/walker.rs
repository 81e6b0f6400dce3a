//! Resolving a pod to the controller that owns it.
//!
//! A pod usually belongs to a ReplicaSet which belongs to a Deployment;
//! the reconciler cares about the top of that chain, since that is where
//! the canary and xDS annotations live.

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use kube::api::ObjectMeta;
use kube::{Api, Client, Resource};

use kage_core::annotations::ObjRef;
use kage_core::Result;

use crate::kinds::WatchKind;

/// Walks `ownerReferences` up to the top-most controller.
#[derive(Clone)]
pub struct ControllerWalker {
    client: Client,
}

/// A resolved controller with its metadata.
#[derive(Clone, Debug)]
pub struct Controller {
    /// Reference to the controller object.
    pub obj_ref: ObjRef,
    /// The controller's kind.
    pub kind: WatchKind,
    /// The controller's full metadata, annotations included.
    pub meta: ObjectMeta,
}

impl ControllerWalker {
    /// Create a walker over the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Resolve the top controller of an object, following only
    /// controller owner references.
    ///
    /// Returns `None` when the object has no controller, or its chain
    /// leads outside the supported kind set before reaching one.
    pub async fn top_controller(
        &self,
        namespace: &str,
        meta: &ObjectMeta,
    ) -> Result<Option<Controller>> {
        let mut current: Option<Controller> = None;
        let mut meta = meta.clone();

        loop {
            let Some(owner) = controller_owner(&meta) else {
                return Ok(current);
            };
            let Ok(kind) = owner.kind.parse::<WatchKind>() else {
                return Ok(current);
            };
            if !kind.is_pod_controller() {
                return Ok(current);
            }

            let Some(owner_meta) = self.fetch_meta(kind, namespace, &owner.name).await? else {
                return Ok(current);
            };

            meta = owner_meta.clone();
            current = Some(Controller {
                obj_ref: ObjRef {
                    name: owner.name,
                    kind: kind.as_str().to_string(),
                    namespace: namespace.to_string(),
                },
                kind,
                meta: owner_meta,
            });
        }
    }

    async fn fetch_meta(
        &self,
        kind: WatchKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ObjectMeta>> {
        let meta = match kind {
            WatchKind::ReplicaSet => self.get_meta::<ReplicaSet>(namespace, name).await?,
            WatchKind::Deployment => self.get_meta::<Deployment>(namespace, name).await?,
            WatchKind::StatefulSet => self.get_meta::<StatefulSet>(namespace, name).await?,
            WatchKind::DaemonSet => self.get_meta::<DaemonSet>(namespace, name).await?,
            _ => None,
        };
        Ok(meta)
    }

    async fn get_meta<K>(&self, namespace: &str, name: &str) -> Result<Option<ObjectMeta>>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + std::fmt::Debug
            + serde::de::DeserializeOwned,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api
            .get_opt(name)
            .await?
            .map(|obj| obj.meta().clone()))
    }
}

fn controller_owner(meta: &ObjectMeta) -> Option<k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference> {
    meta.owner_references
        .as_ref()?
        .iter()
        .find(|r| r.controller == Some(true))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

    fn owned_meta(kind: &str, name: &str, controller: bool) -> ObjectMeta {
        ObjectMeta {
            owner_references: Some(vec![OwnerReference {
                api_version: "apps/v1".to_string(),
                kind: kind.to_string(),
                name: name.to_string(),
                uid: "uid-1".to_string(),
                controller: Some(controller),
                ..Default::default()
            }]),
            ..Default::default()
        }
    }

    #[test]
    fn test_controller_owner_requires_controller_flag() {
        assert!(controller_owner(&owned_meta("ReplicaSet", "rs", false)).is_none());

        let owner = controller_owner(&owned_meta("ReplicaSet", "rs", true)).unwrap();
        assert_eq!(owner.kind, "ReplicaSet");
        assert_eq!(owner.name, "rs");
    }

    #[test]
    fn test_no_owner() {
        assert!(controller_owner(&ObjectMeta::default()).is_none());
    }
}
