//! Builds encoded Envoy v3 resources from [`EnvoyState`].
//!
//! The factory is the only place the prost types are assembled. Every
//! listener it emits pulls its route table over RDS and every cluster is
//! EDS-backed, both pointing at this control plane's own gRPC cluster,
//! so a state mutation propagates without Envoy restarts.

use std::collections::BTreeMap;

use prost::Message;
use prost_types::Any;

use kage_api::envoy::config::cluster::v3 as cluster_v3;
use kage_api::envoy::config::core::v3 as core_v3;
use kage_api::envoy::config::endpoint::v3 as endpoint_v3;
use kage_api::envoy::config::listener::v3 as listener_v3;
use kage_api::envoy::config::route::v3 as route_v3;
use kage_api::envoy::extensions::filters::http::router::v3 as router_v3;
use kage_api::envoy::extensions::filters::network::http_connection_manager::v3 as hcm_v3;
use kage_api::type_url;
use kage_cache::Snapshot;
use kage_core::{names, Error, Result};

use crate::state::{EndpointSpec, EnvoyState, ListenerSpec, Protocol, RouteSpec};

/// Sum every weighted route must reach.
pub const TOTAL_ROUTE_WEIGHT: u32 = 100;

const HCM_FILTER_NAME: &str = "envoy.filters.network.http_connection_manager";
const ROUTER_FILTER_NAME: &str = "envoy.filters.http.router";

/// Build a cache snapshot from the full Envoy state of one node.
///
/// All four resource types are always present in the snapshot, empty or
/// not, so subscribed clients observe deletions. Fails with `Invalid`
/// when a route's target weights do not sum to [`TOTAL_ROUTE_WEIGHT`];
/// nothing is partially installed in that case.
pub fn snapshot(state: &EnvoyState) -> Result<Snapshot> {
    for route in &state.routes {
        validate_route(route)?;
    }

    let version = state.version.to_string();
    let mut builder = Snapshot::builder().version(&version);

    builder = builder.resources(
        type_url::LISTENER,
        state
            .listeners
            .iter()
            .map(|l| (l.name.clone(), pack(type_url::LISTENER, &make_listener(l)))),
    );
    builder = builder.resources(
        type_url::ROUTE_CONFIGURATION,
        state.routes.iter().map(|r| {
            (
                r.name.clone(),
                pack(type_url::ROUTE_CONFIGURATION, &make_route(r)),
            )
        }),
    );
    builder = builder.resources(
        type_url::CLUSTER,
        state.clusters.iter().map(|c| {
            (
                c.name.clone(),
                pack(type_url::CLUSTER, &make_cluster(&c.name)),
            )
        }),
    );
    builder = builder.resources(
        type_url::CLUSTER_LOAD_ASSIGNMENT,
        make_load_assignments(state).into_iter().map(|cla| {
            (
                cla.cluster_name.clone(),
                pack(type_url::CLUSTER_LOAD_ASSIGNMENT, &cla),
            )
        }),
    );

    Ok(builder.build())
}

fn validate_route(route: &RouteSpec) -> Result<()> {
    if route.targets.is_empty() {
        return Err(Error::invalid(format!(
            "route {:?} has no targets",
            route.name
        )));
    }
    let sum: u32 = route.targets.iter().map(|t| t.weight).sum();
    if sum != TOTAL_ROUTE_WEIGHT {
        return Err(Error::invalid(format!(
            "route {:?} weights sum to {sum}, expected {TOTAL_ROUTE_WEIGHT}",
            route.name
        )));
    }
    Ok(())
}

/// Config source pointing Envoy back at this control plane over gRPC.
fn xds_config_source() -> core_v3::ConfigSource {
    core_v3::ConfigSource {
        resource_api_version: core_v3::ApiVersion::V3 as i32,
        config_source_specifier: Some(core_v3::config_source::ConfigSourceSpecifier::ApiConfigSource(
            core_v3::ApiConfigSource {
                api_type: core_v3::api_config_source::ApiType::Grpc as i32,
                transport_api_version: core_v3::ApiVersion::V3 as i32,
                grpc_services: vec![core_v3::GrpcService {
                    timeout: None,
                    target_specifier: Some(core_v3::grpc_service::TargetSpecifier::EnvoyGrpc(
                        core_v3::grpc_service::EnvoyGrpc {
                            cluster_name: names::XDS_CLUSTER.to_string(),
                        },
                    )),
                }],
                set_node_on_first_message_only: true,
                ..Default::default()
            },
        )),
    }
}

/// An HTTP listener whose connection manager resolves its route table by
/// name over RDS.
pub fn make_listener(spec: &ListenerSpec) -> listener_v3::Listener {
    let manager = hcm_v3::HttpConnectionManager {
        codec_type: hcm_v3::http_connection_manager::CodecType::Auto as i32,
        stat_prefix: spec.name.clone(),
        http_filters: vec![hcm_v3::HttpFilter {
            name: ROUTER_FILTER_NAME.to_string(),
            config_type: Some(hcm_v3::http_filter::ConfigType::TypedConfig(pack(
                type_url::ROUTER,
                &router_v3::Router {},
            ))),
        }],
        route_specifier: Some(hcm_v3::http_connection_manager::RouteSpecifier::Rds(
            hcm_v3::Rds {
                config_source: Some(xds_config_source()),
                route_config_name: spec.route.clone(),
            },
        )),
    };

    listener_v3::Listener {
        name: spec.name.clone(),
        address: Some(socket_address(&spec.address, spec.port, spec.protocol)),
        filter_chains: vec![listener_v3::FilterChain {
            filters: vec![listener_v3::Filter {
                name: HCM_FILTER_NAME.to_string(),
                config_type: Some(listener_v3::filter::ConfigType::TypedConfig(pack(
                    type_url::HTTP_CONNECTION_MANAGER,
                    &manager,
                ))),
            }],
            name: String::new(),
        }],
        traffic_direction: core_v3::TrafficDirection::Inbound as i32,
    }
}

/// A single-virtual-host route configuration matching all authorities on
/// the route's path prefix, splitting traffic over the weighted targets.
pub fn make_route(spec: &RouteSpec) -> route_v3::RouteConfiguration {
    let clusters = spec
        .targets
        .iter()
        .map(|t| route_v3::weighted_cluster::ClusterWeight {
            name: t.cluster.clone(),
            weight: Some(t.weight),
        })
        .collect();

    route_v3::RouteConfiguration {
        name: spec.name.clone(),
        virtual_hosts: vec![route_v3::VirtualHost {
            name: spec.name.clone(),
            domains: vec!["*".to_string()],
            routes: vec![route_v3::Route {
                name: spec.name.clone(),
                r#match: Some(route_v3::RouteMatch {
                    path_specifier: Some(route_v3::route_match::PathSpecifier::Prefix(
                        spec.prefix.clone(),
                    )),
                }),
                action: Some(route_v3::route::Action::Route(route_v3::RouteAction {
                    cluster_specifier: Some(
                        route_v3::route_action::ClusterSpecifier::WeightedClusters(
                            route_v3::WeightedCluster {
                                clusters,
                                total_weight: Some(TOTAL_ROUTE_WEIGHT),
                            },
                        ),
                    ),
                })),
            }],
        }],
    }
}

/// An EDS-backed round-robin cluster.
pub fn make_cluster(name: &str) -> cluster_v3::Cluster {
    cluster_v3::Cluster {
        name: name.to_string(),
        eds_cluster_config: Some(cluster_v3::cluster::EdsClusterConfig {
            eds_config: Some(xds_config_source()),
            service_name: name.to_string(),
        }),
        connect_timeout: Some(prost_types::Duration {
            seconds: 5,
            nanos: 0,
        }),
        lb_policy: cluster_v3::cluster::LbPolicy::RoundRobin as i32,
        load_assignment: None,
        cluster_discovery_type: Some(cluster_v3::cluster::ClusterDiscoveryType::Type(
            cluster_v3::cluster::DiscoveryType::Eds as i32,
        )),
    }
}

/// Group endpoints by cluster into load assignments. Every cluster in
/// the state gets an assignment, empty when it has no ready pods, so EDS
/// reports drained clusters instead of going silent.
pub fn make_load_assignments(state: &EnvoyState) -> Vec<endpoint_v3::ClusterLoadAssignment> {
    let mut grouped: BTreeMap<&str, Vec<&EndpointSpec>> = state
        .clusters
        .iter()
        .map(|c| (c.name.as_str(), Vec::new()))
        .collect();
    for endpoint in &state.endpoints {
        grouped
            .entry(endpoint.cluster.as_str())
            .or_default()
            .push(endpoint);
    }

    grouped
        .into_iter()
        .map(|(cluster, endpoints)| endpoint_v3::ClusterLoadAssignment {
            cluster_name: cluster.to_string(),
            endpoints: vec![endpoint_v3::LocalityLbEndpoints {
                locality: None,
                lb_endpoints: endpoints.iter().map(|e| lb_endpoint(e)).collect(),
                load_balancing_weight: None,
                priority: 0,
            }],
        })
        .collect()
}

fn lb_endpoint(spec: &EndpointSpec) -> endpoint_v3::LbEndpoint {
    endpoint_v3::LbEndpoint {
        health_status: core_v3::HealthStatus::Healthy as i32,
        load_balancing_weight: None,
        host_identifier: Some(endpoint_v3::lb_endpoint::HostIdentifier::Endpoint(
            endpoint_v3::Endpoint {
                address: Some(socket_address(&spec.address, spec.port, Protocol::Tcp)),
            },
        )),
    }
}

fn socket_address(address: &str, port: u32, protocol: Protocol) -> core_v3::Address {
    let protocol = match protocol {
        Protocol::Tcp => core_v3::socket_address::Protocol::Tcp,
        Protocol::Udp => core_v3::socket_address::Protocol::Udp,
    };
    core_v3::Address {
        address: Some(core_v3::address::Address::SocketAddress(
            core_v3::SocketAddress {
                protocol: protocol as i32,
                address: address.to_string(),
                port_specifier: Some(core_v3::socket_address::PortSpecifier::PortValue(port)),
            },
        )),
    }
}

fn pack<T: Message>(type_url: &str, message: &T) -> Any {
    Any {
        type_url: type_url.to_string(),
        value: message.encode_to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ClusterSpec, WeightedTarget};
    use kage_core::ErrorKind;

    fn split_state() -> EnvoyState {
        let mut state = EnvoyState::new("kage-ns1-nginx");
        state.listeners = vec![ListenerSpec {
            name: "ingress".to_string(),
            protocol: Protocol::Tcp,
            address: "0.0.0.0".to_string(),
            port: 80,
            route: "split".to_string(),
        }];
        state.routes = vec![RouteSpec {
            name: "split".to_string(),
            prefix: "/".to_string(),
            targets: vec![
                WeightedTarget {
                    cluster: "nginx-kage-service".to_string(),
                    weight: 70,
                },
                WeightedTarget {
                    cluster: "nginx-kage-canary".to_string(),
                    weight: 30,
                },
            ],
        }];
        state.clusters = vec![
            ClusterSpec {
                name: "nginx-kage-service".to_string(),
            },
            ClusterSpec {
                name: "nginx-kage-canary".to_string(),
            },
        ];
        state.endpoints = vec![EndpointSpec {
            cluster: "nginx-kage-service".to_string(),
            address: "10.0.0.1".to_string(),
            port: 8080,
        }];
        state
    }

    #[test]
    fn test_snapshot_carries_all_types() {
        let state = split_state();
        let snapshot = snapshot(&state).unwrap();

        assert_eq!(snapshot.version(), state.version.to_string());
        for url in type_url::ALL_RESOURCES {
            assert!(snapshot.contains_type(url), "missing {url}");
        }
        assert_eq!(snapshot.resources(type_url::LISTENER).unwrap().len(), 1);
        assert_eq!(snapshot.resources(type_url::CLUSTER).unwrap().len(), 2);
        // one assignment per cluster even without endpoints
        assert_eq!(
            snapshot
                .resources(type_url::CLUSTER_LOAD_ASSIGNMENT)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_bad_weights_rejected() {
        let mut state = split_state();
        state.routes[0].targets[1].weight = 40;

        let err = snapshot(&state).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert!(err.to_string().contains("110"));
    }

    #[test]
    fn test_route_without_targets_rejected() {
        let mut state = split_state();
        state.routes[0].targets.clear();
        assert!(snapshot(&state).is_err());
    }

    #[test]
    fn test_weighted_route_encoding() {
        let state = split_state();
        let config = make_route(&state.routes[0]);

        assert_eq!(config.virtual_hosts.len(), 1);
        let vhost = &config.virtual_hosts[0];
        assert_eq!(vhost.domains, vec!["*".to_string()]);

        let route = &vhost.routes[0];
        let Some(route_v3::route_match::PathSpecifier::Prefix(prefix)) =
            &route.r#match.as_ref().unwrap().path_specifier
        else {
            panic!("expected prefix match");
        };
        assert_eq!(prefix, "/");

        let Some(route_v3::route::Action::Route(action)) = &route.action else {
            panic!("expected route action");
        };
        let Some(route_v3::route_action::ClusterSpecifier::WeightedClusters(weighted)) =
            &action.cluster_specifier
        else {
            panic!("expected weighted clusters");
        };
        assert_eq!(weighted.total_weight, Some(100));
        assert_eq!(weighted.clusters[0].weight, Some(70));
        assert_eq!(weighted.clusters[1].weight, Some(30));
    }

    #[test]
    fn test_listener_pulls_routes_over_rds() {
        let state = split_state();
        let listener = make_listener(&state.listeners[0]);

        let filter = &listener.filter_chains[0].filters[0];
        assert_eq!(filter.name, HCM_FILTER_NAME);
        let Some(listener_v3::filter::ConfigType::TypedConfig(any)) = &filter.config_type else {
            panic!("expected typed config");
        };
        assert_eq!(any.type_url, type_url::HTTP_CONNECTION_MANAGER);

        let manager = hcm_v3::HttpConnectionManager::decode(any.value.as_slice()).unwrap();
        let Some(hcm_v3::http_connection_manager::RouteSpecifier::Rds(rds)) =
            manager.route_specifier
        else {
            panic!("expected RDS route specifier");
        };
        assert_eq!(rds.route_config_name, "split");
        assert!(rds.config_source.is_some());
    }

    #[test]
    fn test_cluster_is_eds_backed() {
        let cluster = make_cluster("nginx-kage-service");

        assert_eq!(
            cluster.cluster_discovery_type,
            Some(cluster_v3::cluster::ClusterDiscoveryType::Type(
                cluster_v3::cluster::DiscoveryType::Eds as i32
            ))
        );
        let eds = cluster.eds_cluster_config.unwrap();
        assert_eq!(eds.service_name, "nginx-kage-service");
    }

    #[test]
    fn test_endpoints_grouped_by_cluster() {
        let mut state = split_state();
        state.endpoints.push(EndpointSpec {
            cluster: "nginx-kage-service".to_string(),
            address: "10.0.0.2".to_string(),
            port: 8080,
        });

        let assignments = make_load_assignments(&state);
        assert_eq!(assignments.len(), 2);

        let canary = assignments
            .iter()
            .find(|a| a.cluster_name == "nginx-kage-canary")
            .unwrap();
        assert!(canary.endpoints[0].lb_endpoints.is_empty());

        let service = assignments
            .iter()
            .find(|a| a.cluster_name == "nginx-kage-service")
            .unwrap();
        assert_eq!(service.endpoints[0].lb_endpoints.len(), 2);
    }
}
