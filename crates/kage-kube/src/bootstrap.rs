//! The per-canary Envoy bootstrap ConfigMap.
//!
//! Every proxy Deployment mounts one ConfigMap holding a static Envoy
//! bootstrap: admin listener, node identity, the `xds` cluster pointing
//! back at this control plane, and dynamic LDS/CDS over it. Everything
//! else the proxy learns over xDS.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{DeleteParams, ObjectMeta, PostParams};
use kube::{Api, Client};
use serde_json::json;
use tracing::info;

use kage_core::{names, Error, Result};

/// Data key of the bootstrap file inside the ConfigMap.
pub const BOOTSTRAP_KEY: &str = "envoy.yaml";

/// Substitutions for the bootstrap template.
#[derive(Clone, Debug)]
pub struct BootstrapParams {
    /// xDS node id the proxy presents.
    pub node_id: String,
    /// Envoy node cluster name.
    pub node_cluster: String,
    /// Reachable address of this control plane.
    pub xds_address: String,
    /// xDS gRPC port.
    pub xds_port: u16,
    /// Envoy admin listener port.
    pub admin_port: u16,
    /// Cluster name of the target backend pool.
    pub service_cluster_name: String,
    /// Cluster name of the canary backend pool.
    pub canary_cluster_name: String,
}

/// Render the bootstrap file.
pub fn render(params: &BootstrapParams) -> Result<String> {
    let config_source = json!({
        "resource_api_version": "V3",
        "api_config_source": {
            "api_type": "GRPC",
            "transport_api_version": "V3",
            "set_node_on_first_message_only": true,
            "grpc_services": [
                { "envoy_grpc": { "cluster_name": names::XDS_CLUSTER } }
            ],
        },
    });

    let bootstrap = json!({
        "admin": {
            "address": {
                "socket_address": { "address": "0.0.0.0", "port_value": params.admin_port },
            },
        },
        "node": {
            "id": params.node_id,
            "cluster": params.node_cluster,
            "metadata": {
                "service_cluster": params.service_cluster_name,
                "canary_cluster": params.canary_cluster_name,
            },
        },
        "dynamic_resources": {
            "lds_config": config_source.clone(),
            "cds_config": config_source,
        },
        "static_resources": {
            "clusters": [
                {
                    "name": names::XDS_CLUSTER,
                    "type": "STRICT_DNS",
                    "connect_timeout": "5s",
                    "typed_extension_protocol_options": {
                        "envoy.extensions.upstreams.http.v3.HttpProtocolOptions": {
                            "@type": "type.googleapis.com/envoy.extensions.upstreams.http.v3.HttpProtocolOptions",
                            "explicit_http_config": { "http2_protocol_options": {} },
                        },
                    },
                    "load_assignment": {
                        "cluster_name": names::XDS_CLUSTER,
                        "endpoints": [
                            {
                                "lb_endpoints": [
                                    {
                                        "endpoint": {
                                            "address": {
                                                "socket_address": {
                                                    "address": params.xds_address,
                                                    "port_value": params.xds_port,
                                                },
                                            },
                                        },
                                    },
                                ],
                            },
                        ],
                    },
                },
            ],
        },
    });

    serde_yaml::to_string(&bootstrap)
        .map_err(|e| Error::internal_from("render envoy bootstrap", e))
}

/// The bootstrap ConfigMap for one canary, named after the canary
/// controller.
pub fn config_map(name: &str, params: &BootstrapParams) -> Result<ConfigMap> {
    Ok(ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            BOOTSTRAP_KEY.to_string(),
            render(params)?,
        )])),
        ..Default::default()
    })
}

/// Creates and removes bootstrap ConfigMaps.
#[derive(Clone)]
pub struct BootstrapService {
    client: Client,
}

impl BootstrapService {
    /// Create a service over the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Ensure the bootstrap ConfigMap exists. Idempotent.
    pub async fn ensure(
        &self,
        namespace: &str,
        name: &str,
        params: &BootstrapParams,
    ) -> Result<()> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        if api.get_opt(name).await?.is_some() {
            return Ok(());
        }
        api.create(&PostParams::default(), &config_map(name, params)?)
            .await?;
        info!(namespace, name, "created bootstrap config map");
        Ok(())
    }

    /// Remove the bootstrap ConfigMap. Removing an absent one is fine.
    pub async fn remove(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!(namespace, name, "removed bootstrap config map");
                Ok(())
            }
            Err(err) => match Error::from(err) {
                Error::NotFound(_) => Ok(()),
                other => Err(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BootstrapParams {
        BootstrapParams {
            node_id: "kage-ns1-nginx".to_string(),
            node_cluster: "nginx".to_string(),
            xds_address: "kage.kage-system.svc".to_string(),
            xds_port: 8081,
            admin_port: 8082,
            service_cluster_name: "nginx-kage-service".to_string(),
            canary_cluster_name: "nginx-kage-canary".to_string(),
        }
    }

    #[test]
    fn test_render_bootstrap() {
        let yaml = render(&params()).unwrap();

        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value["node"]["id"], "kage-ns1-nginx");
        assert_eq!(
            value["static_resources"]["clusters"][0]["name"],
            names::XDS_CLUSTER
        );
        assert_eq!(
            value["dynamic_resources"]["lds_config"]["api_config_source"]["api_type"],
            "GRPC"
        );
        assert_eq!(
            value["dynamic_resources"]["cds_config"]["api_config_source"]
                ["set_node_on_first_message_only"],
            true
        );
        assert_eq!(value["admin"]["address"]["socket_address"]["port_value"], 8082);
    }

    #[test]
    fn test_config_map_shape() {
        let cm = config_map("nginx-kage", &params()).unwrap();
        assert_eq!(cm.metadata.name.as_deref(), Some("nginx-kage"));
        assert!(cm.data.unwrap().contains_key(BOOTSTRAP_KEY));
    }
}
