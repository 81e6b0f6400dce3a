//! The Envoy state model.
//!
//! [`EnvoyState`] is the in-memory record of what one Envoy node should
//! do: its listeners, routes, endpoints, and clusters, plus identity and
//! version. All mutations flow through the snapshot client, which merges
//! partial updates into the prior record before persisting.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use kage_core::StateVersion;

/// Transport protocol of a listener.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    /// TCP listener.
    #[default]
    Tcp,
    /// UDP listener.
    Udp,
}

/// A named bound address whose filter chain pulls routes from xDS.
///
/// Unique by port within one node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerSpec {
    /// Listener name.
    pub name: String,
    /// Transport protocol.
    pub protocol: Protocol,
    /// Bind address.
    pub address: String,
    /// Bind port.
    pub port: u32,
    /// Name of the route configuration this listener pulls over RDS.
    pub route: String,
}

/// One backend of a weighted route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedTarget {
    /// Cluster name.
    pub cluster: String,
    /// Share of traffic, out of the route's total of 100.
    pub weight: u32,
}

/// A prefix-matched route splitting traffic over weighted clusters.
///
/// The weights of all targets sum to 100.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    /// Route configuration name.
    pub name: String,
    /// Path prefix to match.
    pub prefix: String,
    /// Weighted backends.
    pub targets: Vec<WeightedTarget>,
}

/// A `(cluster, socket address)` tuple.
///
/// Unique by IP within its cluster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    /// Owning cluster.
    pub cluster: String,
    /// Pod IP.
    pub address: String,
    /// Pod port.
    pub port: u32,
}

/// A logical backend pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    /// Cluster name.
    pub name: String,
}

/// Authoritative per-node Envoy configuration.
///
/// On merge, an empty sub-slice means "no change, inherit prior"; a
/// non-empty slice replaces the prior one wholesale.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvoyState {
    /// The identifier Envoy presents in its xDS bootstrap.
    pub node_id: String,
    /// Version assigned at the last successful mutation.
    pub version: StateVersion,
    /// Listeners, unique by port.
    #[serde(default)]
    pub listeners: Vec<ListenerSpec>,
    /// Route configurations.
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
    /// Endpoints, unique by IP within a cluster.
    #[serde(default)]
    pub endpoints: Vec<EndpointSpec>,
    /// Clusters.
    #[serde(default)]
    pub clusters: Vec<ClusterSpec>,
}

impl EnvoyState {
    /// Create an empty state for a node.
    #[must_use]
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            ..Self::default()
        }
    }

    /// Merge the prior record into this one: any sub-slice left empty by
    /// the caller inherits the prior value.
    pub fn inherit_empty(&mut self, prior: &EnvoyState) {
        if self.listeners.is_empty() {
            self.listeners = prior.listeners.clone();
        }
        if self.routes.is_empty() {
            self.routes = prior.routes.clone();
        }
        if self.endpoints.is_empty() {
            self.endpoints = prior.endpoints.clone();
        }
        if self.clusters.is_empty() {
            self.clusters = prior.clusters.clone();
        }
    }

    /// Drop duplicate entries, first occurrence winning: listeners by
    /// port, endpoints by `(cluster, address)`, clusters and routes by
    /// name.
    pub fn dedup(&mut self) {
        let mut ports = HashSet::new();
        self.listeners.retain(|l| ports.insert(l.port));

        let mut eps = HashSet::new();
        self.endpoints
            .retain(|e| eps.insert((e.cluster.clone(), e.address.clone())));

        let mut routes = HashSet::new();
        self.routes.retain(|r| routes.insert(r.name.clone()));

        let mut clusters = HashSet::new();
        self.clusters.retain(|c| clusters.insert(c.name.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener(port: u32) -> ListenerSpec {
        ListenerSpec {
            name: format!("listener-{port}"),
            protocol: Protocol::Tcp,
            address: "0.0.0.0".to_string(),
            port,
            route: "split".to_string(),
        }
    }

    fn endpoint(cluster: &str, ip: &str) -> EndpointSpec {
        EndpointSpec {
            cluster: cluster.to_string(),
            address: ip.to_string(),
            port: 8080,
        }
    }

    #[test]
    fn test_inherit_empty_slices() {
        let mut prior = EnvoyState::new("n1");
        prior.listeners = vec![listener(80)];
        prior.routes = vec![RouteSpec {
            name: "split".to_string(),
            prefix: "/".to_string(),
            targets: vec![],
        }];
        prior.endpoints = vec![endpoint("c1", "10.0.0.1")];

        let mut incoming = EnvoyState::new("n1");
        incoming.endpoints = vec![endpoint("c1", "10.0.0.2")];
        incoming.inherit_empty(&prior);

        assert_eq!(incoming.listeners, prior.listeners);
        assert_eq!(incoming.routes, prior.routes);
        assert_eq!(incoming.endpoints, vec![endpoint("c1", "10.0.0.2")]);
    }

    #[test]
    fn test_non_empty_slices_replace() {
        let mut prior = EnvoyState::new("n1");
        prior.listeners = vec![listener(80)];

        let mut incoming = EnvoyState::new("n1");
        incoming.listeners = vec![listener(443)];
        incoming.inherit_empty(&prior);

        assert_eq!(incoming.listeners, vec![listener(443)]);
    }

    #[test]
    fn test_listener_dedup_by_port() {
        let mut state = EnvoyState::new("n1");
        let mut second = listener(80);
        second.name = "duplicate".to_string();
        state.listeners = vec![listener(80), second, listener(443)];
        state.dedup();

        assert_eq!(state.listeners.len(), 2);
        assert_eq!(state.listeners[0].name, "listener-80");
    }

    #[test]
    fn test_endpoint_dedup_by_cluster_and_ip() {
        let mut state = EnvoyState::new("n1");
        state.endpoints = vec![
            endpoint("c1", "10.0.0.1"),
            endpoint("c1", "10.0.0.1"),
            endpoint("c1", "10.0.0.2"),
            endpoint("c2", "10.0.0.1"),
        ];
        state.dedup();

        assert_eq!(state.endpoints.len(), 3);
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut state = EnvoyState::new("n1");
        state.listeners = vec![listener(80)];
        state.endpoints = vec![endpoint("c1", "10.0.0.1")];

        let json = serde_json::to_vec(&state).unwrap();
        let back: EnvoyState = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, state);
    }
}
