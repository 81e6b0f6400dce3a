//! Naming and labeling conventions.
//!
//! Every object the control plane creates or marks is named through this
//! module so the reconciler can reconstruct intent from API state alone.

/// Base annotation/label domain.
pub const DOMAIN: &str = "kage.cloud";
/// Domain for the canary annotation on canary controllers.
pub const CANARY_DOMAIN: &str = "canary.kage.cloud";
/// Domain for the xDS and proxy annotations.
pub const XDS_DOMAIN: &str = "xds.kage.cloud";

/// Label key marking persisted snapshot ConfigMaps.
pub const RESOURCE_LABEL: &str = "kage.cloud/resource";
/// Label value for persisted snapshot ConfigMaps.
pub const SNAPSHOT_RESOURCE: &str = "snapshot";
/// Label key flagged `true` on interposed Services.
pub const PROXIED_LABEL: &str = "kage.cloud/proxied";
/// Label key that selects the Envoy proxy pods of one canary.
pub const PROXY_SELECTOR_LABEL: &str = "kage.cloud/proxy";

/// Cluster name Envoy bootstraps with to reach this control plane.
pub const XDS_CLUSTER: &str = "xds";

const SERVICE_CLUSTER_SUFFIX: &str = "-kage-service";
const CANARY_CLUSTER_SUFFIX: &str = "-kage-canary";
const CANARY_SUFFIX: &str = "-kage";
const PROXY_SUFFIX: &str = "-kage-proxy";

/// Envoy cluster name for the target (source) backend pool.
#[must_use]
pub fn service_cluster_name(target: &str) -> String {
    format!("{target}{SERVICE_CLUSTER_SUFFIX}")
}

/// Envoy cluster name for the canary backend pool.
#[must_use]
pub fn canary_cluster_name(target: &str) -> String {
    format!("{target}{CANARY_CLUSTER_SUFFIX}")
}

/// Name of the canary controller cloned from `target`.
#[must_use]
pub fn canary_name(target: &str) -> String {
    format!("{target}{CANARY_SUFFIX}")
}

/// The target whose canary controller is named `name`, when `name`
/// follows the canary naming convention.
#[must_use]
pub fn canary_target(name: &str) -> Option<&str> {
    name.strip_suffix(CANARY_SUFFIX)
        .filter(|t| !t.is_empty() && !t.ends_with(CANARY_SUFFIX))
}

/// Name of the Envoy proxy Deployment for `target`.
#[must_use]
pub fn proxy_name(target: &str) -> String {
    format!("{target}{PROXY_SUFFIX}")
}

/// The target whose proxy Deployment is named `name`, when `name`
/// follows the proxy naming convention.
#[must_use]
pub fn proxy_target(name: &str) -> Option<&str> {
    name.strip_suffix(PROXY_SUFFIX).filter(|t| !t.is_empty())
}

/// Deterministic xDS node identifier for a canary of `target` in
/// `namespace`. Stable across control-plane restarts.
#[must_use]
pub fn node_id(namespace: &str, target: &str) -> String {
    format!("kage-{namespace}-{target}")
}

/// True when `cluster` is one of the two data-plane cluster forms or the
/// xDS bootstrap cluster.
#[must_use]
pub fn is_known_cluster(cluster: &str) -> bool {
    cluster == XDS_CLUSTER
        || cluster.ends_with(SERVICE_CLUSTER_SUFFIX)
        || cluster.ends_with(CANARY_CLUSTER_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_names() {
        assert_eq!(service_cluster_name("nginx"), "nginx-kage-service");
        assert_eq!(canary_cluster_name("nginx"), "nginx-kage-canary");
    }

    #[test]
    fn test_node_id_is_deterministic() {
        assert_eq!(node_id("ns1", "nginx"), "kage-ns1-nginx");
        assert_eq!(node_id("ns1", "nginx"), node_id("ns1", "nginx"));
    }

    #[test]
    fn test_canary_target_inverts_canary_name() {
        assert_eq!(canary_target(&canary_name("nginx")), Some("nginx"));
        assert_eq!(canary_target("nginx"), None);
        assert_eq!(canary_target("-kage"), None);
    }

    #[test]
    fn test_proxy_target_inverts_proxy_name() {
        assert_eq!(proxy_target(&proxy_name("nginx")), Some("nginx"));
        assert_eq!(proxy_target("nginx"), None);
        assert_eq!(proxy_target("-kage-proxy"), None);
    }

    #[test]
    fn test_known_clusters() {
        assert!(is_known_cluster("xds"));
        assert!(is_known_cluster("nginx-kage-service"));
        assert!(is_known_cluster("nginx-kage-canary"));
        assert!(!is_known_cluster("nginx"));
    }
}
