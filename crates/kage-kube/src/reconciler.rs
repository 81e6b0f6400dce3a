//! Event handlers that keep Envoy state aligned with cluster reality.
//!
//! Three handlers feed the snapshot client: pod events recompute the
//! endpoints of the affected canary, service events interpose newly
//! matching Services, and deployment events apply weight changes and
//! drive teardown when either side of a split disappears.
//!
//! All handlers are idempotent; a replayed event converges on the same
//! state. Each handler also consumes the watch's initial list, which is
//! how a restarted control plane catches up on everything that changed
//! while it was down: splits are re-materialized, endpoints rebuilt from
//! live pods, and Services interposed, with no event required.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info};

use kage_core::annotations::{CanaryAnnotation, XdsAnnotation};
use kage_core::{names, ErrorKind, Result};
use kage_xds::state::{EndpointSpec, EnvoyState, ListenerSpec, Protocol};
use kage_xds::MeshConfig;

use crate::canary::{
    proxy_selector, selector_matches, split_route, split_route_name, CanaryService,
};
use crate::informer::EventHandler;
use crate::walker::{Controller, ControllerWalker};

/// Shared reconciliation core behind every handler.
#[derive(Clone)]
pub struct Reconciler {
    client: Client,
    walker: ControllerWalker,
    canaries: CanaryService,
}

impl Reconciler {
    /// Create the reconciler.
    pub fn new(client: Client, canaries: CanaryService) -> Self {
        Self {
            walker: ControllerWalker::new(client.clone()),
            client,
            canaries,
        }
    }

    /// Handler for pod events.
    #[must_use]
    pub fn pods(&self) -> PodReconciler {
        PodReconciler(self.clone())
    }

    /// Handler for service events.
    #[must_use]
    pub fn services(&self) -> ServiceReconciler {
        ServiceReconciler(self.clone())
    }

    /// Handler for deployment events.
    #[must_use]
    pub fn deployments(&self) -> DeploymentReconciler {
        DeploymentReconciler(self.clone())
    }

    /// The canary target a pod belongs to, through its owner chain.
    /// `None` when the pod is not part of any declared split.
    async fn pod_target(&self, namespace: &str, pod: &Pod) -> Result<Option<String>> {
        let Some(controller) = self.walker.top_controller(namespace, &pod.metadata).await? else {
            return Ok(None);
        };
        self.controller_target(namespace, &controller).await
    }

    /// Map a resolved controller to the target name of its split.
    ///
    /// The canary side carries the annotation itself; the target side is
    /// recognized by the existence of its canary clone.
    async fn controller_target(
        &self,
        namespace: &str,
        controller: &Controller,
    ) -> Result<Option<String>> {
        let annotations = controller.meta.annotations.clone().unwrap_or_default();
        if let Some(record) = CanaryAnnotation::from_annotations(&annotations)? {
            return Ok(Some(record.source_obj.name));
        }

        let name = &controller.obj_ref.name;
        if self.canary_annotation(namespace, name).await?.is_some() {
            return Ok(Some(name.clone()));
        }
        Ok(None)
    }

    /// The canary annotation for `target`, read off its canary clone.
    async fn canary_annotation(
        &self,
        namespace: &str,
        target: &str,
    ) -> Result<Option<CanaryAnnotation>> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let Some(canary) = api.get_opt(&names::canary_name(target)).await? else {
            return Ok(None);
        };
        let record = CanaryAnnotation::from_annotations(&canary.annotations().clone())?;
        Ok(record.filter(|r| r.source_obj.name == target))
    }

    /// Rebuild the endpoint set of one split from the pods currently on
    /// the API server, attributing each ready pod to its side through
    /// the owner chain.
    async fn recompute_endpoints(&self, namespace: &str, target: &str) -> Result<()> {
        let Some(record) = self.canary_annotation(namespace, target).await? else {
            return Ok(());
        };
        let mesh = MeshConfig::from_annotation(&record)?;

        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let selector = api
            .get_opt(&names::canary_name(target))
            .await?
            .and_then(|d| {
                XdsAnnotation::from_annotations(&d.annotations().clone())
                    .ok()
                    .flatten()
            })
            .map(|xds| xds.label_selector)
            .unwrap_or_default();

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = if selector.is_empty() {
            ListParams::default()
        } else {
            ListParams::default().labels(&selector_string(&selector))
        };

        let canary_name = names::canary_name(target);
        let mut endpoints = Vec::new();
        let mut ports: Vec<u32> = Vec::new();
        for pod in pods.list(&params).await? {
            let Some((address, port)) = pod_endpoint(&pod) else {
                continue;
            };
            let Some(controller) = self.walker.top_controller(namespace, &pod.metadata).await?
            else {
                continue;
            };
            let cluster = if controller.obj_ref.name == target {
                ports.extend(pod_ports(&pod));
                mesh.target.cluster_name.clone()
            } else if controller.obj_ref.name == canary_name {
                mesh.canary.cluster_name.clone()
            } else {
                continue;
            };
            endpoints.push(EndpointSpec {
                cluster,
                address,
                port,
            });
        }
        if endpoints.is_empty() {
            debug!(namespace, target, "no ready pods, keeping prior endpoints");
            return Ok(());
        }
        ports.sort_unstable();
        ports.dedup();

        // One listener per port the target pods currently publish; ports
        // nobody publishes drop out of the set.
        let mut state = EnvoyState::new(&mesh.node_id);
        state.endpoints = endpoints;
        state.listeners = ports
            .iter()
            .map(|&port| ListenerSpec {
                name: format!("{target}-{port}"),
                protocol: Protocol::Tcp,
                address: "0.0.0.0".to_string(),
                port,
                route: split_route_name(target),
            })
            .collect();
        let version = self.canaries.snapshots().set(state).await?;
        debug!(namespace, target, %version, "recomputed endpoints and listeners");
        Ok(())
    }

    /// Converge one declared split on its end state: bootstrap ConfigMap,
    /// proxy Deployment, interposed Services, seeded Envoy state, and
    /// routing weights matching the annotation. A split whose target
    /// Deployment is gone is torn down instead.
    ///
    /// The canary Deployment is re-read first so a stale event queued
    /// behind a dismantle cannot resurrect the split.
    async fn ensure_canary(&self, namespace: &str, record: &CanaryAnnotation) -> Result<()> {
        let target = &record.source_obj.name;
        if self.canary_annotation(namespace, target).await?.is_none() {
            return Ok(());
        }

        match self.canaries.ensure_materialized(namespace, record).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(namespace, target = %target,
                    "target deployment gone, tearing down its split");
                return self.canaries.teardown(namespace, target).await;
            }
            Err(err) => return Err(err),
        }
        self.apply_weights(namespace, record).await
    }

    /// Apply a changed routing percentage off the canary annotation.
    async fn apply_weights(&self, namespace: &str, record: &CanaryAnnotation) -> Result<()> {
        let mesh = MeshConfig::from_annotation(record)?;
        let desired = split_route(&mesh);

        match self.canaries.snapshots().get(&mesh.node_id).await {
            Ok(current) if current.routes == vec![desired.clone()] => return Ok(()),
            // Declare has not seeded the state yet; it will carry the
            // annotation's weights itself.
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
            Ok(_) => {}
        }

        let mut state = EnvoyState::new(&mesh.node_id);
        state.routes = vec![desired];
        let version = self.canaries.snapshots().set(state).await?;
        info!(
            namespace,
            target = %record.source_obj.name,
            percentage = record.routing_percentage,
            %version,
            "applied routing weights"
        );
        Ok(())
    }

    /// Interpose a Service whose selector matches an active split's
    /// target pods.
    async fn interpose_if_matching(&self, namespace: &str, svc: &Service) -> Result<()> {
        if crate::interpose::is_interposed(svc) {
            return Ok(());
        }
        let Some(selector) = svc.spec.as_ref().and_then(|s| s.selector.clone()) else {
            return Ok(());
        };

        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        for deploy in api.list(&ListParams::default()).await? {
            let annotations = deploy.annotations().clone();
            let Some(record) = CanaryAnnotation::from_annotations(&annotations)? else {
                continue;
            };
            let Some(xds) = XdsAnnotation::from_annotations(&annotations)? else {
                continue;
            };
            if !selector_matches(&selector, &xds.label_selector) {
                continue;
            }
            info!(namespace, service = %svc.name_any(), target = %record.source_obj.name,
                "interposing service that matches an active split");
            self.canaries
                .interposer()
                .interpose(
                    namespace,
                    &svc.name_any(),
                    &proxy_selector(&record.source_obj.name),
                )
                .await?;
        }
        Ok(())
    }
}

/// Keeps endpoints in step with pod churn.
#[derive(Clone)]
pub struct PodReconciler(Reconciler);

#[async_trait]
impl EventHandler<Pod> for PodReconciler {
    /// Rebuild endpoints once per split represented in the initial list,
    /// so pods that churned while the control plane was down are
    /// re-reflected without waiting for a later event.
    async fn on_initial(&self, pods: &[Pod]) -> Result<()> {
        let mut seen = BTreeSet::new();
        for pod in pods {
            let Some(namespace) = pod.namespace() else {
                continue;
            };
            let Some(target) = self.0.pod_target(&namespace, pod).await? else {
                continue;
            };
            if seen.insert((namespace.clone(), target.clone())) {
                self.0.recompute_endpoints(&namespace, &target).await?;
            }
        }
        Ok(())
    }

    async fn on_apply(&self, pod: &Pod) -> Result<()> {
        let Some(namespace) = pod.namespace() else {
            return Ok(());
        };
        let Some(target) = self.0.pod_target(&namespace, pod).await? else {
            return Ok(());
        };
        self.0.recompute_endpoints(&namespace, &target).await
    }

    async fn on_delete(&self, pod: &Pod) -> Result<()> {
        self.on_apply(pod).await
    }
}

/// Interposes Services created after their split was declared.
#[derive(Clone)]
pub struct ServiceReconciler(Reconciler);

#[async_trait]
impl EventHandler<Service> for ServiceReconciler {
    /// Interpose any listed Service that matches an active split but was
    /// created or released while the control plane was down.
    async fn on_initial(&self, services: &[Service]) -> Result<()> {
        for svc in services {
            let Some(namespace) = svc.namespace() else {
                continue;
            };
            self.0.interpose_if_matching(&namespace, svc).await?;
        }
        Ok(())
    }

    async fn on_apply(&self, svc: &Service) -> Result<()> {
        let Some(namespace) = svc.namespace() else {
            return Ok(());
        };
        self.0.interpose_if_matching(&namespace, svc).await
    }

    async fn on_delete(&self, _svc: &Service) -> Result<()> {
        Ok(())
    }
}

/// Applies weight changes and tears splits down when a side disappears.
#[derive(Clone)]
pub struct DeploymentReconciler(Reconciler);

#[async_trait]
impl EventHandler<Deployment> for DeploymentReconciler {
    /// Re-ensure the end state of every canary in the initial list. This
    /// is what un-wedges a declare that crashed partway: the canary
    /// Deployment made it to the API server, so it shows up here and the
    /// remaining materialization steps run again.
    async fn on_initial(&self, objects: &[Deployment]) -> Result<()> {
        for deploy in objects {
            let Some(namespace) = deploy.namespace() else {
                continue;
            };
            let Some(record) = CanaryAnnotation::from_annotations(&deploy.annotations().clone())?
            else {
                continue;
            };
            self.0.ensure_canary(&namespace, &record).await?;
            self.0
                .recompute_endpoints(&namespace, &record.source_obj.name)
                .await?;
        }
        Ok(())
    }

    async fn on_apply(&self, deploy: &Deployment) -> Result<()> {
        let Some(namespace) = deploy.namespace() else {
            return Ok(());
        };
        let Some(record) = CanaryAnnotation::from_annotations(&deploy.annotations().clone())?
        else {
            return Ok(());
        };
        self.0.ensure_canary(&namespace, &record).await
    }

    async fn on_delete(&self, deploy: &Deployment) -> Result<()> {
        let Some(namespace) = deploy.namespace() else {
            return Ok(());
        };
        let name = deploy.name_any();
        let annotations = deploy.annotations().clone();

        // The canary clone was deleted out from under us.
        if let Some(record) = CanaryAnnotation::from_annotations(&annotations)? {
            info!(namespace, canary = %name, "canary deployment deleted, tearing down");
            return self
                .0
                .canaries
                .teardown(&namespace, &record.source_obj.name)
                .await;
        }

        // A target with an active split was deleted.
        if self.0.canary_annotation(&namespace, &name).await?.is_some() {
            info!(namespace, target = %name, "target deployment deleted, tearing down");
            return self.0.canaries.teardown(&namespace, &name).await;
        }
        Ok(())
    }
}

/// A pod's routable address: its IP and first declared container port,
/// only once the pod reports ready.
#[must_use]
pub fn pod_endpoint(pod: &Pod) -> Option<(String, u32)> {
    if !is_pod_ready(pod) {
        return None;
    }
    let address = pod.status.as_ref()?.pod_ip.clone()?;
    let port = pod
        .spec
        .as_ref()?
        .containers
        .iter()
        .flat_map(|c| c.ports.iter().flatten())
        .map(|p| p.container_port as u32)
        .next()?;
    Some((address, port))
}

/// Every container port a pod declares.
#[must_use]
pub fn pod_ports(pod: &Pod) -> Vec<u32> {
    pod.spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .flat_map(|c| c.ports.iter().flatten())
                .map(|p| p.container_port as u32)
                .collect()
        })
        .unwrap_or_default()
}

/// True when the pod's `Ready` condition is `True`.
#[must_use]
pub fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

/// Render a label map as a list-call selector string.
#[must_use]
pub fn selector_string(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, ContainerPort, PodCondition, PodSpec, PodStatus};

    fn pod(ready: bool, ip: Option<&str>, ports: Vec<i32>) -> Pod {
        Pod {
            status: Some(PodStatus {
                pod_ip: ip.map(String::from),
                conditions: Some(vec![PodCondition {
                    type_: "Ready".to_string(),
                    status: if ready { "True" } else { "False" }.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "app".to_string(),
                    ports: Some(
                        ports
                            .into_iter()
                            .map(|p| ContainerPort {
                                container_port: p,
                                ..Default::default()
                            })
                            .collect(),
                    ),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_pod_endpoint_of_ready_pod() {
        let p = pod(true, Some("10.0.0.5"), vec![8080, 9090]);
        assert_eq!(pod_endpoint(&p), Some(("10.0.0.5".to_string(), 8080)));
    }

    #[test]
    fn test_pod_endpoint_requires_ready() {
        assert!(pod_endpoint(&pod(false, Some("10.0.0.5"), vec![8080])).is_none());
    }

    #[test]
    fn test_pod_endpoint_requires_ip_and_port() {
        assert!(pod_endpoint(&pod(true, None, vec![8080])).is_none());
        assert!(pod_endpoint(&pod(true, Some("10.0.0.5"), vec![])).is_none());
    }

    #[test]
    fn test_pod_ports_lists_all_declared() {
        let p = pod(true, Some("10.0.0.5"), vec![8080, 9090]);
        assert_eq!(pod_ports(&p), vec![8080, 9090]);
        assert!(pod_ports(&Pod::default()).is_empty());
    }

    #[test]
    fn test_selector_string() {
        let labels = BTreeMap::from([
            ("app".to_string(), "nginx".to_string()),
            ("tier".to_string(), "web".to_string()),
        ]);
        assert_eq!(selector_string(&labels), "app=nginx,tier=web");
    }
}
