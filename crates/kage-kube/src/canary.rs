//! Declaring and dismantling canaries.
//!
//! Declaring a canary materializes, in order: the canary Deployment
//! cloned from the target, the bootstrap ConfigMap, the Envoy proxy
//! Deployment, the interposed Services, and the seeded Envoy state.
//! Every step checks for pre-existence, so a half-finished declare can
//! be re-run. Dismantling walks the same list in reverse.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, PodSpec, PodTemplateSpec, Service, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{DeleteParams, ListParams, ObjectMeta, PostParams};
use kube::runtime::conditions;
use kube::runtime::wait::await_condition;
use kube::{Api, Client, ResourceExt};
use serde::{Deserialize, Serialize};
use tracing::info;

use kage_core::annotations::{CanaryAnnotation, ClusterRef, ObjRef, XdsAnnotation, XdsConfig};
use kage_core::{names, BatchError, Error, ErrorKind, Result};
use kage_xds::state::{ClusterSpec, EnvoyState, ListenerSpec, Protocol, RouteSpec, WeightedTarget};
use kage_xds::{MeshConfig, SnapshotClient};

use crate::bootstrap::{BootstrapParams, BootstrapService, BOOTSTRAP_KEY};
use crate::interpose::Interposer;
use crate::kinds::WatchKind;

/// How long a proxy Deployment gets to become available.
pub const PROXY_READY_TIMEOUT: Duration = Duration::from_secs(60);

const ENVOY_CONFIG_PATH: &str = "/etc/envoy";

/// Deployment-wide settings for canary materialization.
#[derive(Clone, Debug)]
pub struct CanaryConfig {
    /// Address proxies use to reach this control plane.
    pub xds_address: String,
    /// xDS gRPC port.
    pub xds_port: u16,
    /// Envoy admin port inside proxy pods.
    pub admin_port: u16,
    /// Envoy container image for proxy pods.
    pub envoy_image: String,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            xds_address: "kage".to_string(),
            xds_port: 8081,
            admin_port: 8082,
            envoy_image: "envoyproxy/envoy:v1.30-latest".to_string(),
        }
    }
}

/// A declare request, as the admin surface receives it.
#[derive(Clone, Debug, Deserialize)]
pub struct CanaryRequest {
    /// Target controller name.
    pub name: String,
    /// Target controller kind.
    pub kind: String,
    /// Share of traffic for the canary, out of 100.
    pub canary_routing_percentage: u32,
}

/// What a successful declare reports back.
#[derive(Clone, Debug, Serialize)]
pub struct CanarySummary {
    /// Canary controller name.
    pub name: String,
    /// Target controller name.
    pub target_deploy: String,
    /// Declared routing percentage.
    pub routing_percentage: u32,
}

/// Declares and dismantles canaries.
#[derive(Clone)]
pub struct CanaryService {
    client: Client,
    snapshots: Arc<SnapshotClient>,
    bootstrap: BootstrapService,
    interposer: Interposer,
    config: CanaryConfig,
}

impl CanaryService {
    /// Create the service.
    pub fn new(client: Client, snapshots: Arc<SnapshotClient>, config: CanaryConfig) -> Self {
        Self {
            bootstrap: BootstrapService::new(client.clone()),
            interposer: Interposer::new(client.clone()),
            client,
            snapshots,
            config,
        }
    }

    /// The snapshot client all state flows through.
    pub fn snapshots(&self) -> &Arc<SnapshotClient> {
        &self.snapshots
    }

    /// The interposer this service applies Services through.
    pub fn interposer(&self) -> &Interposer {
        &self.interposer
    }

    /// Declare a canary for `request.name` in `namespace`.
    pub async fn declare(&self, namespace: &str, request: &CanaryRequest) -> Result<CanarySummary> {
        let kind: WatchKind = request.kind.parse()?;
        if kind != WatchKind::Deployment {
            return Err(Error::Unsupported(format!(
                "canary target kind {}",
                request.kind
            )));
        }

        let annotation = CanaryAnnotation {
            source_obj: ObjRef {
                name: request.name.clone(),
                kind: request.kind.clone(),
                namespace: namespace.to_string(),
            },
            canary_obj: ObjRef {
                name: names::canary_name(&request.name),
                kind: request.kind.clone(),
                namespace: namespace.to_string(),
            },
            routing_percentage: request.canary_routing_percentage,
        };
        let mesh = MeshConfig::from_annotation(&annotation)?;

        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let target = deployments.get_opt(&request.name).await?.ok_or_else(|| {
            Error::NotFound(format!("deployment {namespace}/{}", request.name))
        })?;
        if deployments
            .get_opt(&annotation.canary_obj.name)
            .await?
            .is_some()
        {
            return Err(Error::AlreadyExists(format!(
                "canary for {namespace}/{}",
                request.name
            )));
        }

        let canary = canary_deployment(&target, &annotation, &mesh);
        deployments.create(&PostParams::default(), &canary).await?;
        info!(namespace, canary = %annotation.canary_obj.name, "created canary deployment");

        self.ensure_materialized(namespace, &annotation).await?;

        Ok(CanarySummary {
            name: annotation.canary_obj.name,
            target_deploy: request.name.clone(),
            routing_percentage: request.canary_routing_percentage,
        })
    }

    /// Bring the materialized side of a declared split to its end state:
    /// bootstrap ConfigMap, proxy Deployment (waited ready), interposed
    /// Services, and a seeded Envoy state for nodes that have none.
    ///
    /// Every step no-ops when its object is already in place, so this
    /// repairs a declare that was interrupted partway as well as objects
    /// deleted out from under a running split. `NotFound` when the
    /// target Deployment is gone.
    pub async fn ensure_materialized(
        &self,
        namespace: &str,
        record: &CanaryAnnotation,
    ) -> Result<()> {
        let mesh = MeshConfig::from_annotation(record)?;
        let target_name = &record.source_obj.name;

        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let target = deployments
            .get_opt(target_name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("deployment {namespace}/{target_name}")))?;

        let bootstrap_name = record.canary_obj.name.clone();
        self.bootstrap
            .ensure(
                namespace,
                &bootstrap_name,
                &BootstrapParams {
                    node_id: mesh.node_id.clone(),
                    node_cluster: target_name.clone(),
                    xds_address: self.config.xds_address.clone(),
                    xds_port: self.config.xds_port,
                    admin_port: self.config.admin_port,
                    service_cluster_name: mesh.target.cluster_name.clone(),
                    canary_cluster_name: mesh.canary.cluster_name.clone(),
                },
            )
            .await?;

        let proxy_name = names::proxy_name(target_name);
        if deployments.get_opt(&proxy_name).await?.is_none() {
            let proxy = proxy_deployment(
                namespace,
                target_name,
                &bootstrap_name,
                &self.config.envoy_image,
            );
            deployments.create(&PostParams::default(), &proxy).await?;
            info!(namespace, proxy = %proxy_name, "created proxy deployment");
        }
        self.wait_proxy_ready(namespace, &proxy_name).await?;

        self.interpose_matching_services(namespace, &target, target_name)
            .await?;

        match self.snapshots.get(&mesh.node_id).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.snapshots
                    .set(seed_state(&mesh, &target_ports(&target)))
                    .await?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Dismantle the canary of `target` in `namespace`.
    ///
    /// `NotFound` when no canary exists for the target. Individual
    /// teardown failures are gathered so one stuck object does not stop
    /// the rest from going away.
    pub async fn dismantle(&self, namespace: &str, target: &str) -> Result<()> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        if deployments
            .get_opt(&names::canary_name(target))
            .await?
            .is_none()
        {
            return Err(Error::NotFound(format!("canary for {namespace}/{target}")));
        }
        self.teardown(namespace, target).await
    }

    /// Tear down whatever remains of a canary, without requiring the
    /// canary Deployment to still exist. Used when teardown is driven by
    /// an observed deletion.
    pub async fn teardown(&self, namespace: &str, target: &str) -> Result<()> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let mut batch = BatchError::new();

        if let Err(err) = self.release_interposed_services(namespace, target).await {
            batch.push(err);
        }
        for name in [names::proxy_name(target), names::canary_name(target)] {
            if let Err(err) = delete_deployment(&deployments, &name).await {
                batch.push(err);
            }
        }
        if let Err(err) = self
            .bootstrap
            .remove(namespace, &names::canary_name(target))
            .await
        {
            batch.push(err);
        }
        if let Err(err) = self.snapshots.delete(&names::node_id(namespace, target)).await {
            batch.push(err);
        }

        batch.into_result()?;
        info!(namespace, target, "dismantled canary");
        Ok(())
    }

    /// The current Envoy state of one canary, for the admin surface.
    pub async fn state(&self, namespace: &str, target: &str) -> Result<EnvoyState> {
        self.snapshots.get(&names::node_id(namespace, target)).await
    }

    async fn wait_proxy_ready(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let ready = await_condition(api, name, conditions::is_deployment_completed());

        tokio::time::timeout(PROXY_READY_TIMEOUT, ready)
            .await
            .map_err(|_| Error::Timeout(format!("proxy deployment {namespace}/{name} not ready")))?
            .map_err(|e| Error::internal_from("waiting for proxy deployment", e))?;
        Ok(())
    }

    async fn interpose_matching_services(
        &self,
        namespace: &str,
        target: &Deployment,
        target_name: &str,
    ) -> Result<()> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let pod_labels = pod_template_labels(target);
        let replacement = proxy_selector(target_name);

        let mut batch = BatchError::new();
        for svc in services.list(&ListParams::default()).await? {
            let Some(selector) = svc.spec.as_ref().and_then(|s| s.selector.as_ref()) else {
                continue;
            };
            if !selector_matches(selector, &pod_labels) {
                continue;
            }
            if let Err(err) = self
                .interposer
                .interpose(namespace, &svc.name_any(), &replacement)
                .await
            {
                batch.push(err);
            }
        }
        batch.into_result()
    }

    async fn release_interposed_services(&self, namespace: &str, target: &str) -> Result<()> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let replacement = proxy_selector(target);

        let mut batch = BatchError::new();
        for svc in services.list(&ListParams::default()).await? {
            let selector = svc.spec.as_ref().and_then(|s| s.selector.as_ref());
            if selector != Some(&replacement) {
                continue;
            }
            if let Err(err) = self.interposer.release(namespace, &svc.name_any()).await {
                batch.push(err);
            }
        }
        batch.into_result()
    }
}

async fn delete_deployment(api: &Api<Deployment>, name: &str) -> Result<()> {
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(err) => match Error::from(err) {
            Error::NotFound(_) => Ok(()),
            other => Err(other),
        },
    }
}

/// Label set selecting the Envoy proxy pods of one target.
#[must_use]
pub fn proxy_selector(target: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(names::PROXY_SELECTOR_LABEL.to_string(), target.to_string())])
}

/// True when every selector entry is present in the pod labels.
#[must_use]
pub fn selector_matches(
    selector: &BTreeMap<String, String>,
    pod_labels: &BTreeMap<String, String>,
) -> bool {
    !selector.is_empty()
        && selector
            .iter()
            .all(|(k, v)| pod_labels.get(k) == Some(v))
}

fn pod_template_labels(deploy: &Deployment) -> BTreeMap<String, String> {
    deploy
        .spec
        .as_ref()
        .and_then(|s| s.template.metadata.as_ref())
        .and_then(|m| m.labels.clone())
        .unwrap_or_default()
}

/// Ports the target's pod template exposes, deduplicated.
#[must_use]
pub fn target_ports(deploy: &Deployment) -> Vec<u32> {
    let mut ports: Vec<u32> = deploy
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .map(|spec| {
            spec.containers
                .iter()
                .flat_map(|c| c.ports.iter().flatten())
                .map(|p| p.container_port as u32)
                .collect()
        })
        .unwrap_or_default();
    ports.sort_unstable();
    ports.dedup();
    ports
}

/// The canary Deployment: the target's spec with kage identity attached.
#[must_use]
pub fn canary_deployment(
    target: &Deployment,
    annotation: &CanaryAnnotation,
    mesh: &MeshConfig,
) -> Deployment {
    let mut annotations = annotation.to_annotations();
    annotations.extend(
        XdsAnnotation {
            node_id: mesh.node_id.clone(),
            label_selector: pod_template_labels(target),
            config: XdsConfig {
                canary: ClusterRef {
                    cluster_name: mesh.canary.cluster_name.clone(),
                },
                source: ClusterRef {
                    cluster_name: mesh.target.cluster_name.clone(),
                },
                node_id: mesh.node_id.clone(),
            },
        }
        .to_annotations(),
    );

    Deployment {
        metadata: ObjectMeta {
            name: Some(annotation.canary_obj.name.clone()),
            namespace: target.metadata.namespace.clone(),
            annotations: Some(annotations),
            labels: target.metadata.labels.clone(),
            ..Default::default()
        },
        spec: target.spec.clone(),
        status: None,
    }
}

/// The Envoy proxy Deployment for one target.
#[must_use]
pub fn proxy_deployment(
    namespace: &str,
    target: &str,
    bootstrap_name: &str,
    image: &str,
) -> Deployment {
    let labels = proxy_selector(target);

    Deployment {
        metadata: ObjectMeta {
            name: Some(names::proxy_name(target)),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "envoy".to_string(),
                        image: Some(image.to_string()),
                        args: Some(vec![
                            "-c".to_string(),
                            format!("{ENVOY_CONFIG_PATH}/{BOOTSTRAP_KEY}"),
                        ]),
                        ports: Some(vec![ContainerPort {
                            container_port: 8082,
                            name: Some("admin".to_string()),
                            ..Default::default()
                        }]),
                        volume_mounts: Some(vec![VolumeMount {
                            name: "envoy-config".to_string(),
                            mount_path: ENVOY_CONFIG_PATH.to_string(),
                            read_only: Some(true),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    volumes: Some(vec![Volume {
                        name: "envoy-config".to_string(),
                        config_map: Some(ConfigMapVolumeSource {
                            name: bootstrap_name.to_string(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

/// The initial Envoy state of a fresh canary: clusters, the weighted
/// route, and one listener per target port. Endpoints arrive later from
/// pod events.
#[must_use]
pub fn seed_state(mesh: &MeshConfig, ports: &[u32]) -> EnvoyState {
    let mut state = EnvoyState::new(&mesh.node_id);
    state.clusters = vec![
        ClusterSpec {
            name: mesh.target.cluster_name.clone(),
        },
        ClusterSpec {
            name: mesh.canary.cluster_name.clone(),
        },
    ];
    state.routes = vec![split_route(mesh)];
    state.listeners = ports
        .iter()
        .map(|&port| ListenerSpec {
            name: format!("{}-{port}", mesh.target.deploy_name),
            protocol: Protocol::Tcp,
            address: "0.0.0.0".to_string(),
            port,
            route: split_route_name(&mesh.target.deploy_name),
        })
        .collect();
    state
}

/// Name of the weighted route configuration of one target.
#[must_use]
pub fn split_route_name(target: &str) -> String {
    format!("{target}-split")
}

/// The weighted route realizing a mesh's traffic split.
#[must_use]
pub fn split_route(mesh: &MeshConfig) -> RouteSpec {
    RouteSpec {
        name: split_route_name(&mesh.target.deploy_name),
        prefix: "/".to_string(),
        targets: vec![
            WeightedTarget {
                cluster: mesh.target.cluster_name.clone(),
                weight: mesh.target.weight,
            },
            WeightedTarget {
                cluster: mesh.canary.cluster_name.clone(),
                weight: mesh.canary.weight,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kage_core::annotations::CanaryAnnotation;

    fn target_deployment() -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some("nginx".to_string()),
                namespace: Some("ns1".to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(3),
                selector: LabelSelector {
                    match_labels: Some(BTreeMap::from([(
                        "app".to_string(),
                        "nginx".to_string(),
                    )])),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(BTreeMap::from([(
                            "app".to_string(),
                            "nginx".to_string(),
                        )])),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "nginx".to_string(),
                            ports: Some(vec![
                                ContainerPort {
                                    container_port: 80,
                                    ..Default::default()
                                },
                                ContainerPort {
                                    container_port: 80,
                                    ..Default::default()
                                },
                                ContainerPort {
                                    container_port: 8443,
                                    ..Default::default()
                                },
                            ]),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            status: None,
        }
    }

    fn mesh() -> MeshConfig {
        MeshConfig::from_annotation(&CanaryAnnotation {
            source_obj: ObjRef {
                name: "nginx".to_string(),
                kind: "Deployment".to_string(),
                namespace: "ns1".to_string(),
            },
            canary_obj: ObjRef {
                name: "nginx-kage".to_string(),
                kind: "Deployment".to_string(),
                namespace: "ns1".to_string(),
            },
            routing_percentage: 25,
        })
        .unwrap()
    }

    #[test]
    fn test_target_ports_deduplicated() {
        assert_eq!(target_ports(&target_deployment()), vec![80, 8443]);
    }

    #[test]
    fn test_selector_matching() {
        let labels = BTreeMap::from([
            ("app".to_string(), "nginx".to_string()),
            ("tier".to_string(), "web".to_string()),
        ]);

        let selector = BTreeMap::from([("app".to_string(), "nginx".to_string())]);
        assert!(selector_matches(&selector, &labels));

        let wrong = BTreeMap::from([("app".to_string(), "redis".to_string())]);
        assert!(!selector_matches(&wrong, &labels));

        assert!(!selector_matches(&BTreeMap::new(), &labels));
    }

    #[test]
    fn test_canary_deployment_carries_annotations() {
        let mesh = mesh();
        let annotation = CanaryAnnotation {
            source_obj: ObjRef {
                name: "nginx".to_string(),
                kind: "Deployment".to_string(),
                namespace: "ns1".to_string(),
            },
            canary_obj: ObjRef {
                name: "nginx-kage".to_string(),
                kind: "Deployment".to_string(),
                namespace: "ns1".to_string(),
            },
            routing_percentage: 25,
        };

        let canary = canary_deployment(&target_deployment(), &annotation, &mesh);
        assert_eq!(canary.metadata.name.as_deref(), Some("nginx-kage"));

        let annotations = canary.metadata.annotations.unwrap();
        let decoded = CanaryAnnotation::from_annotations(&annotations)
            .unwrap()
            .unwrap();
        assert_eq!(decoded.routing_percentage, 25);

        let xds = XdsAnnotation::from_annotations(&annotations).unwrap().unwrap();
        assert_eq!(xds.node_id, "kage-ns1-nginx");
        assert_eq!(xds.config.canary.cluster_name, "nginx-kage-canary");
        assert_eq!(xds.label_selector["app"], "nginx");
    }

    #[test]
    fn test_proxy_deployment_shape() {
        let proxy = proxy_deployment("ns1", "nginx", "nginx-kage", "envoyproxy/envoy:v1.30-latest");

        assert_eq!(proxy.metadata.name.as_deref(), Some("nginx-kage-proxy"));
        let spec = proxy.spec.unwrap();
        assert_eq!(
            spec.selector.match_labels.as_ref().unwrap()[names::PROXY_SELECTOR_LABEL],
            "nginx"
        );
        let pod = spec.template.spec.unwrap();
        assert_eq!(pod.containers[0].name, "envoy");
        assert_eq!(
            pod.volumes.unwrap()[0].config_map.as_ref().unwrap().name,
            "nginx-kage"
        );
    }

    #[test]
    fn test_seed_state_split() {
        let state = seed_state(&mesh(), &[80]);

        assert_eq!(state.node_id, "kage-ns1-nginx");
        assert_eq!(state.listeners.len(), 1);
        assert_eq!(state.listeners[0].port, 80);

        let route = &state.routes[0];
        assert_eq!(route.prefix, "/");
        assert_eq!(route.targets[0].weight + route.targets[1].weight, 100);
        assert_eq!(route.targets[0].cluster, "nginx-kage-service");
        assert_eq!(route.targets[0].weight, 75);
        assert_eq!(route.targets[1].weight, 25);
    }
}
